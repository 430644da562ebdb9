use serde::{Deserialize, Serialize};

use crate::error::{NeonError, Result};

pub const DEFAULT_API_URL: &str = "https://console.neon.tech/api/v2";
pub const DEFAULT_PARENT_BRANCH: &str = "main";

/// Session configuration for one test run or suite.
///
/// Immutable once built; every lifecycle manager owns its own copy so
/// concurrent tests never share a mutable default branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeonConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    /// Branch new test branches are forked from.
    pub parent_branch: String,
    /// Keep branches around after the test body returns.
    pub no_cleanup: bool,
    pub api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for NeonConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            parent_branch: DEFAULT_PARENT_BRANCH.to_string(),
            no_cleanup: false,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl NeonConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Load configuration from defaults, an optional `neon` config file, a
    /// `.env` file and `NEON_*` environment variables, in that order of
    /// precedence (last wins).
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenvy::dotenv().ok();

        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&NeonConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("neon").required(false));

        // NEON_API_KEY, NEON_PROJECT_ID, NEON_PARENT_BRANCH, ...
        config = config.add_source(
            config::Environment::with_prefix("NEON")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: NeonConfig = config.build()?.try_deserialize()?;
        config.validate()
    }

    /// Reject configs missing the credentials every request needs.
    pub fn validate(self) -> Result<Self> {
        if self.api_key.is_empty() {
            return Err(NeonError::MissingConfig("NEON_API_KEY"));
        }
        if self.project_id.is_empty() {
            return Err(NeonError::MissingConfig("NEON_PROJECT_ID"));
        }
        Ok(self)
    }

    pub fn with_parent_branch(mut self, parent_branch: impl Into<String>) -> Self {
        self.parent_branch = parent_branch.into();
        self
    }

    pub fn with_no_cleanup(mut self, no_cleanup: bool) -> Self {
        self.no_cleanup = no_cleanup;
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Base URL of the project's branch collection.
    pub fn branches_url(&self) -> String {
        format!(
            "{}/projects/{}/branches",
            self.api_url.trim_end_matches('/'),
            self.project_id
        )
    }
}
