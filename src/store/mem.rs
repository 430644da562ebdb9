use parking_lot::Mutex;

use crate::error::{NeonError, Result};
use crate::model::{
    Branch, BranchCreated, BranchId, BranchName, Branches, ConnectionParameters, ConnectionUri,
    CreateBranch, Database, Endpoint, EndpointType, Operation, Role,
};
use crate::store::traits::BranchStore;

#[derive(Debug, Default)]
struct MemoryState {
    branches: Vec<Branch>,
    next_id: u64,
    locked_creates: u32,
    create_attempts: u32,
    deletes: u32,
}

/// In-process branch registry that behaves like the remote service:
/// unique names, 404 on unknown ids, and optional lock contention.
#[derive(Debug)]
pub struct MemoryStore {
    project_id: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// A project containing only a root `main` branch.
    pub fn new(project_id: impl Into<String>) -> Self {
        let store = Self {
            project_id: project_id.into(),
            state: Mutex::new(MemoryState::default()),
        };
        store.add_root_branch("main");
        store
    }

    /// Add a branch without a parent, as the project's initial branches are.
    pub fn add_root_branch(&self, name: &str) -> BranchId {
        let mut state = self.state.lock();
        let id = Self::allocate_id(&mut state);
        state.branches.push(Branch::new(
            id.clone(),
            self.project_id.clone(),
            BranchName::new(name),
            None,
        ));
        id
    }

    /// Answer the next `count` create requests with a lock conflict.
    pub fn lock_next_creates(&self, count: u32) {
        self.state.lock().locked_creates = count;
    }

    pub fn create_attempts(&self) -> u32 {
        self.state.lock().create_attempts
    }

    pub fn delete_count(&self) -> u32 {
        self.state.lock().deletes
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.state
            .lock()
            .branches
            .iter()
            .map(|branch| branch.name.to_string())
            .collect()
    }

    fn allocate_id(state: &mut MemoryState) -> BranchId {
        state.next_id += 1;
        BranchId(format!("br-mem-{:04}", state.next_id))
    }

    fn not_found(operation: &'static str, id: &BranchId) -> NeonError {
        NeonError::UnexpectedStatus {
            operation,
            status: 404,
            url: format!("memory://branches/{id}"),
            body: r#"{"message":"branch not found"}"#.to_string(),
        }
    }

    fn provision(&self, branch: Branch) -> BranchCreated {
        let endpoint_id = format!("ep-{}", branch.id);
        let host = format!("{endpoint_id}.memory.local");
        let parameters = ConnectionParameters {
            database: "neondb".to_string(),
            password: "memory".to_string(),
            role: "neondb_owner".to_string(),
            host: host.clone(),
            pooler_host: format!("{endpoint_id}-pooler.memory.local"),
        };

        BranchCreated {
            endpoints: vec![Endpoint {
                id: endpoint_id.clone(),
                host: host.clone(),
                project_id: self.project_id.clone(),
                branch_id: branch.id.clone(),
                autoscaling_limit_min_cu: 0.25,
                autoscaling_limit_max_cu: 0.25,
                region_id: "memory".to_string(),
                endpoint_type: EndpointType::ReadWrite,
                current_state: "init".to_string(),
                pending_state: Some("active".to_string()),
                settings: Default::default(),
                pooler_enabled: false,
                pooler_mode: "transaction".to_string(),
                disabled: false,
                passwordless_access: true,
                creation_source: "neon-testdb".to_string(),
                created_at: branch.created_at,
                updated_at: branch.updated_at,
                proxy_host: "memory.local".to_string(),
                suspend_timeout_seconds: 0,
                provisioner: "memory".to_string(),
            }],
            operations: vec![Operation {
                id: format!("op-{}", branch.id),
                project_id: self.project_id.clone(),
                branch_id: Some(branch.id.clone()),
                endpoint_id: Some(endpoint_id),
                action: "start_compute".to_string(),
                status: "scheduling".to_string(),
                failures_count: 0,
                created_at: branch.created_at,
                updated_at: branch.updated_at,
                total_duration_ms: 0,
            }],
            roles: vec![Role {
                branch_id: branch.id.clone(),
                name: parameters.role.clone(),
                protected: false,
                created_at: branch.created_at,
                updated_at: branch.updated_at,
            }],
            databases: vec![Database {
                id: 1,
                branch_id: branch.id.clone(),
                name: parameters.database.clone(),
                owner_name: parameters.role.clone(),
                created_at: branch.created_at,
                updated_at: branch.updated_at,
            }],
            connection_uris: vec![ConnectionUri {
                connection_uri: format!(
                    "postgresql://{}:{}@{}/{}?sslmode=require",
                    parameters.role, parameters.password, host, parameters.database
                ),
                connection_parameters: parameters,
            }],
            branch,
        }
    }
}

#[async_trait::async_trait]
impl BranchStore for MemoryStore {
    async fn list_branches(&self) -> Result<Option<Branches>> {
        Ok(Some(Branches {
            branches: self.state.lock().branches.clone(),
            annotations: Default::default(),
        }))
    }

    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>> {
        Ok(self
            .state
            .lock()
            .branches
            .iter()
            .find(|branch| &branch.id == id)
            .cloned())
    }

    async fn create_branch(&self, request: &CreateBranch) -> Result<BranchCreated> {
        let branch = {
            let mut state = self.state.lock();
            state.create_attempts += 1;

            if state.locked_creates > 0 {
                state.locked_creates -= 1;
                return Err(NeonError::Locked {
                    operation: "create_branch",
                });
            }
            if !state.branches.iter().any(|b| b.id == request.parent_id) {
                return Err(Self::not_found("create_branch", &request.parent_id));
            }
            if state.branches.iter().any(|b| b.name == request.name) {
                return Err(NeonError::UnexpectedStatus {
                    operation: "create_branch",
                    status: 409,
                    url: "memory://branches".to_string(),
                    body: format!(r#"{{"message":"branch {} already exists"}}"#, request.name),
                });
            }

            let id = Self::allocate_id(&mut state);
            let branch = Branch::new(
                id,
                self.project_id.clone(),
                request.name.clone(),
                Some(request.parent_id.clone()),
            );
            state.branches.push(branch.clone());
            branch
        };

        Ok(self.provision(branch))
    }

    async fn delete_branch(&self, id: &BranchId) -> Result<()> {
        let mut state = self.state.lock();
        let Some(index) = state.branches.iter().position(|branch| &branch.id == id) else {
            return Err(Self::not_found("delete_branch", id));
        };
        state.branches.remove(index);
        state.deletes += 1;
        Ok(())
    }
}
