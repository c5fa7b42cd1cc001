//! Roster entry point: runs one create or join pass from configuration.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::signal;

mod config;

use config::{Config, Operation};
use roster::provider::NativeProvider;
use roster::runtime::DryRunRuntime;
use roster::state::{FileStateStore, StateStore};
use roster::types::Ssh;
use roster::NodeRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting roster with config: {:?}", cfg);

    let store = Arc::new(FileStateStore::new(cfg.marker_dir()));
    for phase in store.pending_phases(&cfg.name)? {
        warn!(
            "Found a leftover {} marker for cluster {} in {}; a previous run did not finish",
            phase,
            cfg.name,
            store.dir().display()
        );
    }

    let mut provider = NativeProvider::new(cfg.name.clone(), store);
    provider.options.master_ips = cfg.master_ips.clone();
    provider.options.worker_ips = cfg.worker_ips.clone();
    provider.ssh = Ssh {
        user: cfg.ssh_user.clone(),
        port: cfg.ssh_port.clone(),
        key_path: cfg.ssh_key_path.clone(),
        password: cfg.ssh_password.clone(),
    };
    provider.generate_cluster_name();
    if !provider.load_state()? {
        info!("No saved state for cluster {}, starting empty", cfg.name);
    }

    let runtime = DryRunRuntime::new();
    let registry = Arc::new(NodeRegistry::new());

    let pass = match cfg.operation {
        Operation::Create => {
            provider.create_check()?;
            tokio::select! {
                result = provider.create_cluster(&registry, &runtime) => Some(result),
                _ = signal::ctrl_c() => None,
            }
        }
        Operation::Join => {
            provider.join_check()?;
            tokio::select! {
                result = provider.join_nodes(&registry, &runtime) => Some(result),
                _ = signal::ctrl_c() => None,
            }
        }
        Operation::Delete => return provider.delete_cluster(false).map_err(Into::into),
        Operation::Ssh => return provider.ssh_node(&cfg.master_ips).map_err(Into::into),
        Operation::Describe => return provider.describe_cluster().map_err(Into::into),
    };

    match pass {
        Some(Ok(())) => {
            info!(
                "Cluster {} now has {} master(s) and {} worker(s)",
                provider.metadata.name, provider.status.master_count, provider.status.worker_count
            );
            Ok(())
        }
        Some(Err(e)) => {
            if cfg.rollback_on_failure {
                let ids = registry.rollback_candidates();
                let warnings = provider.rollback(&ids, &registry, &runtime).await;
                if !warnings.is_empty() {
                    error!("Rollback left {} node(s) behind", warnings.len());
                }
            }
            Err(e.into())
        }
        None => {
            warn!("Interrupted; the phase marker is left in place for inspection");
            Ok(())
        }
    }
}
