use anyhow::{bail, Context};
use neon_testdb::logic::local_hostname;
use neon_testdb::{BranchLifecycle, BranchName, BranchStore, NeonConfig};

const USAGE: &str = "usage: neon-testdb <list | create <name> | delete <name> | prune [prefix]>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with explicit filter to keep HTTP internals quiet
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = NeonConfig::load().context("Failed to load Neon configuration")?;
    log::info!(
        "project={} parent_branch={} api={}",
        config.project_id,
        config.parent_branch,
        config.api_url
    );
    let neon = BranchLifecycle::from_config(&config)?;

    match (command.as_str(), args.get(1)) {
        ("list", None) => {
            let branches = neon
                .store()
                .list_branches()
                .await?
                .context("Project not found")?;
            for branch in branches.branches {
                println!(
                    "{}\t{}\t{}\t{}",
                    branch.id,
                    branch.name,
                    branch.current_state,
                    branch
                        .parent_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        ("create", Some(name)) => {
            let created = neon.forced_create_branch(&BranchName::new(name.as_str())).await?;
            let uri = created
                .primary_connection_uri()
                .context("Branch was created without a connection uri")?;
            println!("{}", uri.connection_uri);
        }
        ("delete", Some(name)) => {
            let name = BranchName::new(name.as_str());
            if neon.delete_branch_by_name(&name).await? {
                println!("deleted {}", name);
            } else {
                println!("no branch named {}", name);
            }
        }
        ("prune", prefix) => {
            let prefix = prefix
                .cloned()
                .unwrap_or_else(|| format!("{}.", local_hostname()));
            let pruned = neon.prune(&prefix).await?;
            println!("pruned {} branch(es) matching '{}*'", pruned.len(), prefix);
            for name in pruned {
                println!("  {}", name);
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
