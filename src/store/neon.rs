use reqwest::{Method, StatusCode};

use crate::config::NeonConfig;
use crate::error::{NeonError, Result};
use crate::model::{
    Branch, BranchCreated, BranchId, BranchResponse, Branches, CreateBranch, CreateBranchRequest,
};
use crate::store::traits::BranchStore;
use crate::store::transport::{decode, expect_status, Transport};

/// Branch registry backed by the Neon REST API.
#[derive(Debug, Clone)]
pub struct NeonStore {
    transport: Transport,
    branches_url: String,
}

impl NeonStore {
    pub fn new(config: &NeonConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
            branches_url: config.branches_url(),
        })
    }

    pub fn branches_url(&self) -> &str {
        &self.branches_url
    }

    pub fn branch_url(&self, id: &BranchId) -> String {
        format!("{}/{}", self.branches_url, id)
    }
}

#[async_trait::async_trait]
impl BranchStore for NeonStore {
    async fn list_branches(&self) -> Result<Option<Branches>> {
        const OP: &str = "list_branches";
        let response = self
            .transport
            .send(OP, self.transport.request(Method::GET, &self.branches_url))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = expect_status(OP, response, &[StatusCode::OK]).await?;
        Ok(Some(decode(OP, response).await?))
    }

    async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>> {
        const OP: &str = "get_branch";
        let response = self
            .transport
            .send(OP, self.transport.request(Method::GET, &self.branch_url(id)))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = expect_status(OP, response, &[StatusCode::OK]).await?;
        let BranchResponse { branch } = decode(OP, response).await?;
        Ok(Some(branch))
    }

    async fn create_branch(&self, request: &CreateBranch) -> Result<BranchCreated> {
        const OP: &str = "create_branch";
        let body = CreateBranchRequest::read_write(request.clone());
        let response = self
            .transport
            .send(
                OP,
                self.transport
                    .request(Method::POST, &self.branches_url)
                    .json(&body),
            )
            .await?;

        if response.status() == StatusCode::LOCKED {
            return Err(NeonError::Locked { operation: OP });
        }

        let response = expect_status(OP, response, &[StatusCode::OK, StatusCode::CREATED]).await?;
        let created: BranchCreated = decode(OP, response).await?;
        log::info!(
            "created branch {} ({}) with {} endpoint(s)",
            created.branch.name,
            created.branch.id,
            created.endpoints.len()
        );
        Ok(created)
    }

    async fn delete_branch(&self, id: &BranchId) -> Result<()> {
        const OP: &str = "delete_branch";
        let response = self
            .transport
            .send(OP, self.transport.request(Method::DELETE, &self.branch_url(id)))
            .await?;

        expect_status(OP, response, &[StatusCode::OK]).await?;
        log::info!("deleted branch {}", id);
        Ok(())
    }
}
