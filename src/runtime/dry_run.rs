use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::info;

use super::{Decommissioner, Installer};
use crate::error::{DecommissionWarning, Result};
use crate::registry::NodeRegistry;
use crate::types::{Cluster, Node};

/// Status a node reports once the dry run has walked it.
pub const PLANNED: &str = "Planned";

/// Walks the plan without touching any machine. Each node is visited by
/// its own task, which records its status in the registry the same way a
/// real installer would.
#[derive(Debug, Clone, Default)]
pub struct DryRunRuntime;

impl DryRunRuntime {
    pub fn new() -> Self {
        Self
    }

    async fn walk(nodes: Vec<Node>, registry: Arc<NodeRegistry>) {
        let tasks = nodes.into_iter().map(|node| {
            let registry = Arc::clone(&registry);
            async move {
                let role = if node.master { "master" } else { "worker" };
                info!(
                    "[dry-run] would install {} on {} ({}@{})",
                    role,
                    node.instance_id,
                    node.ssh.user,
                    node.public_ip_address.join(",")
                );
                registry.update(&node.instance_id, |n| n.instance_status = PLANNED.to_string());
            }
        });
        join_all(tasks).await;
    }
}

fn all_nodes(cluster: &Cluster) -> Vec<Node> {
    cluster
        .status
        .master_nodes
        .iter()
        .chain(cluster.status.worker_nodes.iter())
        .cloned()
        .collect()
}

#[async_trait]
impl Installer for DryRunRuntime {
    async fn install(&self, cluster: &Cluster, registry: Arc<NodeRegistry>) -> Result<()> {
        info!(
            "[dry-run] creating cluster {} with masters [{}] and workers [{}]",
            cluster.metadata.name, cluster.options.master_ips, cluster.options.worker_ips
        );
        Self::walk(all_nodes(cluster), registry).await;
        Ok(())
    }

    async fn join(
        &self,
        cluster: &Cluster,
        added: &Cluster,
        registry: Arc<NodeRegistry>,
    ) -> Result<()> {
        info!(
            "[dry-run] joining {} master(s) and {} worker(s) to cluster {}",
            added.status.master_nodes.len(),
            added.status.worker_nodes.len(),
            cluster.metadata.name
        );
        Self::walk(all_nodes(added), registry).await;
        Ok(())
    }
}

#[async_trait]
impl Decommissioner for DryRunRuntime {
    async fn decommission(&self, nodes: &[Node]) -> Vec<DecommissionWarning> {
        for node in nodes {
            info!("[dry-run] would uninstall {}", node.instance_id);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{collect_added, reconcile};
    use crate::types::Ssh;

    #[tokio::test]
    async fn join_marks_only_added_nodes() {
        let mut cluster = Cluster::default();
        let first = Arc::new(NodeRegistry::new());
        let masters = vec!["1.2.3.4".to_string()];
        reconcile(&masters, &[], &Ssh::default(), &first, &mut cluster.status).unwrap();

        let registry = Arc::new(NodeRegistry::new());
        let workers = vec!["5.6.7.8".to_string()];
        reconcile(&[], &workers, &Ssh::default(), &registry, &mut cluster.status).unwrap();
        let added = collect_added(&registry, &cluster);

        DryRunRuntime::new()
            .join(&cluster, &added, Arc::clone(&registry))
            .await
            .unwrap();
        assert_eq!(registry.get("5-6-7-8").unwrap().instance_status, PLANNED);
        assert!(registry.get("1-2-3-4").is_none());
    }

    #[tokio::test]
    async fn decommission_never_warns() {
        let node = Node {
            instance_id: "1-2-3-4".into(),
            ..Default::default()
        };
        assert!(DryRunRuntime::new().decommission(&[node]).await.is_empty());
    }
}
