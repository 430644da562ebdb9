//! Ephemeral Neon database branches for integration tests.
//!
//! ```no_run
//! use neon_testdb::{test_name, BranchLifecycle};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let neon = BranchLifecycle::load()?;
//! neon.using_test_branch(&test_name!(), |uri| async move {
//!     println!("connect to {}", uri.connection_parameters.host);
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use config::NeonConfig;
pub use error::{NeonError, Result};
pub use logic::{test_branch_name, BranchLifecycle, RetryPolicy, TestName};
pub use model::*;
pub use store::{BranchStore, MemoryStore, NeonStore};

/// Route `log` output through env_logger for test binaries. Safe to call
/// from every test.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}
