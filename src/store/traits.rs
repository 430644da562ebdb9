use crate::error::Result;
use crate::model::{Branch, BranchCreated, BranchId, BranchName, Branches, CreateBranch};

/// CRUD over a project's branches. Every read hits the backing service;
/// nothing is cached.
#[async_trait::async_trait]
pub trait BranchStore: Send + Sync {
    /// List all branches. `None` when the project itself is not found.
    async fn list_branches(&self) -> Result<Option<Branches>>;

    /// Fetch one branch by id. `None` when it does not exist.
    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>>;

    /// Submit a branch creation. Fails with `NeonError::Locked` while another
    /// operation holds the project lock.
    async fn create_branch(&self, request: &CreateBranch) -> Result<BranchCreated>;

    async fn delete_branch(&self, id: &BranchId) -> Result<()>;

    /// Linear scan of `list_branches` for a display name.
    async fn get_branch_by_name(&self, name: &BranchName) -> Result<Option<Branch>> {
        let Some(branches) = self.list_branches().await? else {
            return Ok(None);
        };
        Ok(branches.find_by_name(name).cloned())
    }
}
