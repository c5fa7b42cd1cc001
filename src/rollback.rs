//! Best-effort undo of nodes a failed pass introduced.

use log::debug;

use crate::error::DecommissionWarning;
use crate::registry::NodeRegistry;
use crate::runtime::Decommissioner;
use crate::types::Node;

/// Resolves `ids` through the registry and hands every known node to the
/// decommissioner in one batch. Unknown ids are skipped. Per-node
/// failures come back as warnings; this never fails as a whole.
pub async fn rollback(
    ids: &[String],
    registry: &NodeRegistry,
    decommissioner: &dyn Decommissioner,
) -> Vec<DecommissionWarning> {
    let nodes: Vec<Node> = ids
        .iter()
        .filter_map(|id| {
            let node = registry.get(id);
            if node.is_none() {
                debug!("node {} is not in the registry, skipping", id);
            }
            node
        })
        .collect();

    if nodes.is_empty() {
        return Vec::new();
    }
    decommissioner.decommission(&nodes).await
}
