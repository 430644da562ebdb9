use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use crate::config::NeonConfig;
use crate::error::{NeonError, Result};
use crate::logic::naming::{local_hostname, test_branch_name, TestName};
use crate::model::{BranchCreated, BranchName, ConnectionUri, CreateBranch};
use crate::store::{BranchStore, NeonStore};

/// Backoff schedule for creates rejected with a lock conflict.
///
/// Attempt `n` (zero based) sleeps `initial_backoff + n * backoff_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub backoff_step: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(10),
            backoff_step: Duration::from_millis(10),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff + self.backoff_step * attempt
    }
}

/// Creates, hands out and tears down branches forked from one parent.
#[derive(Debug)]
pub struct BranchLifecycle<S> {
    store: S,
    parent_branch: BranchName,
    no_cleanup: bool,
    retry: RetryPolicy,
}

impl BranchLifecycle<NeonStore> {
    /// Load `NeonConfig` from the environment and talk to the Neon API.
    pub fn load() -> Result<Self> {
        let config = NeonConfig::load()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &NeonConfig) -> Result<Self> {
        Ok(Self::new(NeonStore::new(config)?, config))
    }
}

impl<S: BranchStore> BranchLifecycle<S> {
    pub fn new(store: S, config: &NeonConfig) -> Self {
        Self {
            store,
            parent_branch: BranchName::new(config.parent_branch.clone()),
            no_cleanup: config.no_cleanup,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn parent_branch(&self) -> &BranchName {
        &self.parent_branch
    }

    /// Create `name`, first deleting any branch left over under that name.
    pub async fn forced_create_branch(&self, name: &BranchName) -> Result<BranchCreated> {
        if let Some(stale) = self.store.get_branch_by_name(name).await? {
            log::info!("deleting stale branch {} ({})", stale.name, stale.id);
            self.store.delete_branch(&stale.id).await?;
        }
        self.create_branch(name).await
    }

    /// Fork `name` from the parent branch, retrying while the project is locked.
    pub async fn create_branch(&self, name: &BranchName) -> Result<BranchCreated> {
        let parent = self
            .store
            .get_branch_by_name(&self.parent_branch)
            .await?
            .ok_or_else(|| NeonError::ParentNotFound {
                branch: name.to_string(),
                parent: self.parent_branch.to_string(),
            })?;

        let request = CreateBranch {
            name: name.clone(),
            parent_id: parent.id,
        };

        let start = Instant::now();
        for attempt in 0..self.retry.max_attempts {
            match self.store.create_branch(&request).await {
                Err(err) if err.is_locked() => {
                    let backoff = self.retry.backoff(attempt);
                    log::warn!(
                        "branch {} locked (attempt {}/{}), retrying in {:?}",
                        name,
                        attempt + 1,
                        self.retry.max_attempts,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }

        Err(NeonError::LockTimeout {
            branch: name.to_string(),
            attempts: self.retry.max_attempts,
            elapsed: start.elapsed(),
        })
    }

    /// Run `body` against a fresh branch called `name`.
    ///
    /// The branch is deleted afterwards unless cleanup is suppressed, also
    /// when `body` panics; the panic is resumed once the branch is gone.
    /// Whatever `body` returns, including its own `Result`, comes back
    /// unchanged inside `Ok`.
    pub async fn using_branch<F, Fut, T>(&self, name: &BranchName, body: F) -> Result<T>
    where
        F: FnOnce(ConnectionUri) -> Fut,
        Fut: Future<Output = T>,
    {
        let created = self.forced_create_branch(name).await?;
        let uri = created
            .primary_connection_uri()
            .cloned()
            .ok_or_else(|| NeonError::NoConnectionUri(name.to_string()));

        let uri = match uri {
            Ok(uri) => uri,
            Err(err) => {
                // NoConnectionUri is reported even if this cleanup fails
                if !self.no_cleanup {
                    if let Err(cleanup) = self.store.delete_branch(&created.branch.id).await {
                        log::warn!("cleanup of branch {} without connection uri failed: {}", name, cleanup);
                    }
                }
                return Err(err);
            }
        };

        let outcome = AssertUnwindSafe(async move { body(uri).await })
            .catch_unwind()
            .await;

        if self.no_cleanup {
            log::info!("keeping branch {} ({})", created.branch.name, created.branch.id);
        } else {
            let cleanup = self.store.delete_branch(&created.branch.id).await;
            if let Err(panic) = outcome {
                if let Err(err) = cleanup {
                    log::warn!("cleanup of branch {} after panic failed: {}", name, err);
                }
                std::panic::resume_unwind(panic);
            }
            cleanup?;
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// `using_branch` with a name derived from this host and `test`.
    pub async fn using_test_branch<F, Fut, T>(&self, test: &TestName, body: F) -> Result<T>
    where
        F: FnOnce(ConnectionUri) -> Fut,
        Fut: Future<Output = T>,
    {
        let name = test_branch_name(&local_hostname(), test);
        self.using_branch(&name, body).await
    }

    /// Delete the branch called `name` if there is one.
    pub async fn delete_branch_by_name(&self, name: &BranchName) -> Result<bool> {
        match self.store.get_branch_by_name(name).await? {
            Some(branch) => {
                self.store.delete_branch(&branch.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete every branch whose name starts with `prefix`, never the parent.
    pub async fn prune(&self, prefix: &str) -> Result<Vec<BranchName>> {
        let Some(branches) = self.store.list_branches().await? else {
            return Ok(Vec::new());
        };

        let mut pruned = Vec::new();
        for branch in branches.branches {
            if branch.name == self.parent_branch || !branch.name.as_str().starts_with(prefix) {
                continue;
            }
            self.store.delete_branch(&branch.id).await?;
            pruned.push(branch.name);
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn lifecycle(no_cleanup: bool) -> BranchLifecycle<MemoryStore> {
        let config = NeonConfig::new("key", "p1").with_no_cleanup(no_cleanup);
        BranchLifecycle::new(MemoryStore::new("p1"), &config)
    }

    #[test]
    fn default_backoff_grows_by_ten_milliseconds() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(0), Duration::from_millis(10));
        assert_eq!(retry.backoff(1), Duration::from_millis(20));
        assert_eq!(retry.backoff(9), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn forced_create_forks_from_parent() {
        let lifecycle = lifecycle(false);
        let name = BranchName::new("h1.TestFoo");

        let created = lifecycle.forced_create_branch(&name).await.unwrap();
        let fetched = lifecycle
            .store()
            .get_branch(&created.branch.id)
            .await
            .unwrap()
            .unwrap();
        let parent = lifecycle
            .store()
            .get_branch_by_name(&BranchName::new("main"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.name, name);
        assert!(fetched.is_forked_from(&parent));
    }

    #[tokio::test]
    async fn forced_create_twice_replaces_branch() {
        let lifecycle = lifecycle(false);
        let name = BranchName::new("h1.TestFoo");

        let first = lifecycle.forced_create_branch(&name).await.unwrap();
        let second = lifecycle.forced_create_branch(&name).await.unwrap();

        assert_ne!(first.branch.id, second.branch.id);
        assert!(lifecycle.store().get_branch(&first.branch.id).await.unwrap().is_none());
        assert_eq!(lifecycle.store().delete_count(), 1);
        assert_eq!(
            lifecycle
                .store()
                .branch_names()
                .iter()
                .filter(|n| n.as_str() == "h1.TestFoo")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn missing_parent_is_reported() {
        let config = NeonConfig::new("key", "p1").with_parent_branch("staging");
        let lifecycle = BranchLifecycle::new(MemoryStore::new("p1"), &config);

        let err = lifecycle
            .create_branch(&BranchName::new("h1.TestFoo"))
            .await
            .unwrap_err();
        match err {
            NeonError::ParentNotFound { branch, parent } => {
                assert_eq!(branch, "h1.TestFoo");
                assert_eq!(parent, "staging");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn retries_until_lock_clears() {
        let lifecycle = lifecycle(false);
        lifecycle.store().lock_next_creates(3);

        let created = lifecycle
            .create_branch(&BranchName::new("h1.Locked"))
            .await
            .unwrap();

        assert_eq!(created.branch.name.as_str(), "h1.Locked");
        assert_eq!(lifecycle.store().create_attempts(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let lifecycle = lifecycle(false).with_retry_policy(RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            backoff_step: Duration::from_millis(1),
            max_attempts: 3,
        });
        lifecycle.store().lock_next_creates(u32::MAX);

        let err = lifecycle
            .create_branch(&BranchName::new("h1.Locked"))
            .await
            .unwrap_err();

        match err {
            NeonError::LockTimeout { attempts, elapsed, .. } => {
                assert_eq!(attempts, 3);
                assert!(elapsed >= Duration::from_millis(6));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lifecycle.store().create_attempts(), 3);
    }

    #[tokio::test]
    async fn using_branch_cleans_up() {
        let lifecycle = lifecycle(false);
        let name = BranchName::new("h1.Cleanup");

        let host = lifecycle
            .using_branch(&name, |uri| async move { uri.connection_parameters.host })
            .await
            .unwrap();

        assert!(host.ends_with(".memory.local"));
        assert!(lifecycle.store().get_branch_by_name(&name).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn body_error_is_returned_after_cleanup() {
        let lifecycle = lifecycle(false);
        let name = BranchName::new("h1.BodyFails");

        let outcome = lifecycle
            .using_branch(&name, |_| async { Err::<(), String>("ping failed".to_string()) })
            .await
            .unwrap();

        assert_eq!(outcome, Err("ping failed".to_string()));
        assert!(lifecycle.store().get_branch_by_name(&name).await.unwrap().is_none());
        assert_eq!(lifecycle.store().delete_count(), 1);
    }

    #[tokio::test]
    async fn no_cleanup_keeps_branch() {
        let lifecycle = lifecycle(true);
        let name = BranchName::new("h1.Kept");

        lifecycle.using_branch(&name, |_| async {}).await.unwrap();

        assert!(lifecycle.store().get_branch_by_name(&name).await.unwrap().is_some());
        assert_eq!(lifecycle.store().delete_count(), 0);
    }

    #[tokio::test]
    async fn panicking_body_still_cleans_up() {
        let lifecycle = lifecycle(false);
        let name = BranchName::new("h1.Panics");

        let outcome = AssertUnwindSafe(lifecycle.using_branch(&name, |_| async {
            panic!("assertion failed inside test body");
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert!(lifecycle.store().get_branch_by_name(&name).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_branch_uses_host_and_test_name() {
        let lifecycle = lifecycle(true);
        let test = TestName::new("TestFoo/case1");

        lifecycle.using_test_branch(&test, |_| async {}).await.unwrap();
        lifecycle.using_test_branch(&test, |_| async {}).await.unwrap();

        let expected = test_branch_name(&local_hostname(), &test);
        let names = lifecycle.store().branch_names();
        assert_eq!(names.iter().filter(|n| *n == expected.as_str()).count(), 1);
        assert!(expected.as_str().ends_with(".TestFoo.case1"));
    }

    #[tokio::test]
    async fn prune_skips_parent_and_other_prefixes() {
        let lifecycle = lifecycle(true);
        for name in ["h1.A", "h1.B", "h2.A"] {
            lifecycle.forced_create_branch(&BranchName::new(name)).await.unwrap();
        }

        let pruned = lifecycle.prune("h1.").await.unwrap();

        assert_eq!(pruned, vec![BranchName::new("h1.A"), BranchName::new("h1.B")]);
        let mut remaining = lifecycle.store().branch_names();
        remaining.sort();
        assert_eq!(remaining, vec!["h2.A", "main"]);
    }
}
