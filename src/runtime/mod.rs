use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DecommissionWarning, Result};
use crate::registry::NodeRegistry;
use crate::types::{Cluster, Node};

pub mod dry_run;
pub use dry_run::DryRunRuntime;

#[async_trait]
pub trait Installer: Send + Sync {
    /// Installs onto every node of a freshly merged cluster.
    async fn install(&self, cluster: &Cluster, registry: Arc<NodeRegistry>) -> Result<()>;

    /// Joins the nodes in `added` to the already running `cluster`.
    async fn join(&self, cluster: &Cluster, added: &Cluster, registry: Arc<NodeRegistry>)
        -> Result<()>;
}

#[async_trait]
pub trait Decommissioner: Send + Sync {
    /// Best-effort teardown. Every node that could not be torn down yields
    /// one warning.
    async fn decommission(&self, nodes: &[Node]) -> Vec<DecommissionWarning>;
}
