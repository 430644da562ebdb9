use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{Branch, BranchId, BranchName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    ReadWrite,
    ReadOnly,
}

/// Compute endpoint provisioned for a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub project_id: String,
    pub branch_id: BranchId,
    #[serde(default)]
    pub autoscaling_limit_min_cu: f64,
    #[serde(default)]
    pub autoscaling_limit_max_cu: f64,
    #[serde(default)]
    pub region_id: String,
    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub pending_state: Option<String>,
    #[serde(default)]
    pub settings: HashMap<String, Value>,
    #[serde(default)]
    pub pooler_enabled: bool,
    #[serde(default)]
    pub pooler_mode: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub passwordless_access: bool,
    #[serde(default)]
    pub creation_source: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proxy_host: String,
    #[serde(default)]
    pub suspend_timeout_seconds: i64,
    #[serde(default)]
    pub provisioner: String,
}

/// Asynchronous work the service may still be running after a create
/// returns. Reported as-is; callers rely on the first connection attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub failures_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_duration_ms: i64,
}

impl Operation {
    pub fn is_finished(&self) -> bool {
        self.status == "finished"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub branch_id: BranchId,
    pub name: String,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: i64,
    pub branch_id: BranchId,
    pub name: String,
    pub owner_name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Decomposed parts of a connection string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    pub database: String,
    pub password: String,
    pub role: String,
    pub host: String,
    #[serde(default)]
    pub pooler_host: String,
}

/// Credential-bearing connection string plus its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionUri {
    pub connection_uri: String,
    pub connection_parameters: ConnectionParameters,
}

impl ConnectionUri {
    pub fn as_str(&self) -> &str {
        &self.connection_uri
    }
}

/// Everything the service hands back from a successful branch creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCreated {
    pub branch: Branch,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub databases: Vec<Database>,
    #[serde(default)]
    pub connection_uris: Vec<ConnectionUri>,
}

impl BranchCreated {
    pub fn primary_connection_uri(&self) -> Option<&ConnectionUri> {
        self.connection_uris.first()
    }

    pub fn pending_operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| !op.is_finished())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEndpoint {
    #[serde(rename = "type")]
    pub endpoint_type: EndpointType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBranch {
    pub name: BranchName,
    pub parent_id: BranchId,
}

/// Body of `POST /projects/{project}/branches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBranchRequest {
    pub endpoints: Vec<CreateEndpoint>,
    pub branch: CreateBranch,
}

impl CreateBranchRequest {
    /// A branch with a single read-write compute endpoint.
    pub fn read_write(branch: CreateBranch) -> Self {
        Self {
            endpoints: vec![CreateEndpoint {
                endpoint_type: EndpointType::ReadWrite,
            }],
            branch,
        }
    }
}
