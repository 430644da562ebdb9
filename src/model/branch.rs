use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Opaque identifier assigned by Neon (`br-...`). Used in URL paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

/// Human-assigned branch name, unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(pub String);

impl BranchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BranchName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for BranchName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for BranchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Point-in-time snapshot of a remote branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    #[serde(default)]
    pub project_id: String,
    /// Absent on the project's root branch.
    #[serde(default)]
    pub parent_id: Option<BranchId>,
    #[serde(default)]
    pub parent_lsn: Option<String>,
    #[serde(default)]
    pub parent_timestamp: Option<DateTime<Utc>>,
    pub name: BranchName,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub pending_state: Option<String>,
    #[serde(default)]
    pub state_changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creation_source: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub cpu_used_sec: i64,
    #[serde(default)]
    pub compute_time_seconds: i64,
    #[serde(default)]
    pub active_time_seconds: i64,
    #[serde(default)]
    pub written_data_bytes: i64,
    #[serde(default)]
    pub data_transfer_bytes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<CreatedBy>,
}

impl Branch {
    /// Minimal snapshot, as the service reports a freshly forked branch.
    pub fn new(
        id: BranchId,
        project_id: impl Into<String>,
        name: BranchName,
        parent_id: Option<BranchId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id: project_id.into(),
            parent_id,
            parent_lsn: None,
            parent_timestamp: None,
            name,
            current_state: "init".to_string(),
            pending_state: Some("ready".to_string()),
            state_changed_at: Some(now),
            creation_source: "neon-testdb".to_string(),
            primary: false,
            default: false,
            protected: false,
            cpu_used_sec: 0,
            compute_time_seconds: 0,
            active_time_seconds: 0,
            written_data_bytes: 0,
            data_transfer_bytes: 0,
            created_at: Some(now),
            updated_at: Some(now),
            created_by: None,
        }
    }

    pub fn is_forked_from(&self, parent: &Branch) -> bool {
        self.parent_id.as_ref() == Some(&parent.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedBy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// Response of `GET /projects/{project}/branches`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Branches {
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
}

impl Branches {
    pub fn find_by_name(&self, name: &BranchName) -> Option<&Branch> {
        self.branches.iter().find(|branch| &branch.name == name)
    }
}

/// Response of `GET /projects/{project}/branches/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchResponse {
    pub branch: Branch,
}
