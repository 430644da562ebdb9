//! Provisions real branches. Needs NEON_API_KEY and NEON_PROJECT_ID (a `.env`
//! file works), so it only runs with `cargo test -- --ignored`.

use neon_testdb::{init_test_logging, test_name, BranchLifecycle, BranchName, BranchStore};
use sqlx::postgres::PgPoolOptions;

#[tokio::test]
#[ignore = "requires Neon credentials"]
async fn test_connection_with_fresh_branch() -> anyhow::Result<()> {
    init_test_logging();
    let neon = BranchLifecycle::load()?;
    let test = test_name!();

    // Twice: the second run must replace, not collide with, the first branch
    for _ in 0..2 {
        neon.using_test_branch(&test, |uri| async move {
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(uri.as_str())
                .await
                .expect("Failed to connect to branch");
            let one: i32 = sqlx::query_scalar("SELECT 1")
                .fetch_one(&pool)
                .await
                .expect("Failed to ping branch");
            assert_eq!(one, 1);
            pool.close().await;
        })
        .await?;
    }

    Ok(())
}

#[tokio::test]
#[ignore = "requires Neon credentials"]
async fn forced_create_forks_configured_parent() -> anyhow::Result<()> {
    init_test_logging();
    let neon = BranchLifecycle::load()?;
    let name = BranchName::new(format!("neon-testdb.{}", uuid::Uuid::new_v4()));

    let created = neon.forced_create_branch(&name).await?;
    let fetched = neon.store().get_branch(&created.branch.id).await?;
    let parent = neon.store().get_branch_by_name(neon.parent_branch()).await?;
    neon.store().delete_branch(&created.branch.id).await?;

    let fetched = fetched.expect("created branch should be readable");
    let parent = parent.expect("parent branch should exist");
    assert_eq!(fetched.name, name);
    assert!(fetched.is_forked_from(&parent));
    assert!(neon.store().get_branch_by_name(&name).await?.is_none());
    Ok(())
}
