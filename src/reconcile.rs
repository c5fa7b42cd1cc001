//! Folding requested addresses into durable cluster membership.
//!
//! A pass seeds the registry from the requested master and worker
//! addresses, then merges every registry record into the durable
//! [`Status`]. Nodes already committed by an earlier pass are never
//! appended twice; their `current`/`rollback` flags are cleared instead.

use std::collections::HashMap;
use std::net::IpAddr;

use log::debug;

use crate::error::{Error, Result};
use crate::registry::NodeRegistry;
use crate::types::{Cluster, Node, Ssh, Status};

/// Status label for nodes that are addressed but not yet installed.
pub const UNPROVISIONED: &str = "-";

/// Stable identity of a node known only by its address.
pub fn instance_id(address: &str) -> String {
    address.replace('.', "-")
}

/// Rejects address sets that would break the one-role-per-node rule or
/// seed garbage identities. Collisions are checked on the derived
/// identity, so `node.a` and `node-a` count as the same node.
pub fn validate_addresses(masters: &[String], workers: &[String], status: &Status) -> Result<()> {
    let mut seen: HashMap<String, bool> = HashMap::new();
    for (addresses, master) in [(masters, true), (workers, false)] {
        for address in addresses {
            if address.is_empty() {
                return Err(Error::validation(address, "empty address"));
            }
            if !is_valid_address(address) {
                return Err(Error::validation(address, "not an IP address or hostname"));
            }
            let id = instance_id(address);
            if let Some(seen_master) = seen.insert(id.clone(), master) {
                let reason = if seen_master != master {
                    "listed as both master and worker"
                } else {
                    "listed more than once"
                };
                return Err(Error::validation(address, reason));
            }
            if status.position(!master, &id).is_some() {
                let reason = if master {
                    "already a worker of this cluster"
                } else {
                    "already a master of this cluster"
                };
                return Err(Error::validation(address, reason));
            }
        }
    }
    Ok(())
}

fn is_valid_address(address: &str) -> bool {
    if address.parse::<IpAddr>().is_ok() {
        return true;
    }
    let labels: Vec<&str> = address.split('.').collect();
    // All-numeric names that failed to parse are broken IPv4 literals.
    if labels.iter().all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    address.len() <= 253
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Stores a fresh record for every address, overwriting earlier entries
/// with the same identity.
pub fn seed(registry: &NodeRegistry, addresses: &[String], master: bool, ssh: &Ssh) {
    for address in addresses {
        let id = instance_id(address);
        registry.put(
            &id,
            Node {
                instance_id: id.clone(),
                master,
                current: true,
                rollback: true,
                instance_status: UNPROVISIONED.to_string(),
                internal_ip_address: vec![address.clone()],
                public_ip_address: vec![address.clone()],
                ssh: ssh.clone(),
            },
        );
    }
}

/// Seeds the registry and merges it into `status`. Returns the new
/// master and worker counts, which are also stored on `status`.
pub fn reconcile(
    masters: &[String],
    workers: &[String],
    ssh: &Ssh,
    registry: &NodeRegistry,
    status: &mut Status,
) -> Result<(usize, usize)> {
    validate_addresses(masters, workers, status)?;
    seed(registry, masters, true, ssh);
    seed(registry, workers, false, ssh);

    registry.for_each(|node| {
        let nodes = status.nodes_for_mut(node.master);
        match nodes.iter().position(|n| n.instance_id == node.instance_id) {
            None => {
                debug!("node {} is new to the cluster", node.instance_id);
                nodes.push(node.clone());
            }
            Some(index) => {
                debug!("node {} is already committed", node.instance_id);
                nodes[index].current = false;
                nodes[index].rollback = false;
                registry.update(&node.instance_id, |n| {
                    n.current = false;
                    n.rollback = false;
                });
            }
        }
    });

    status.refresh_counts();
    Ok((status.master_count, status.worker_count))
}

/// Builds the cluster handed to the installer on join: only nodes the
/// current pass introduced. Their registry entries are compacted into
/// rollback records along the way.
pub fn collect_added(registry: &NodeRegistry, cluster: &Cluster) -> Cluster {
    let mut added = Cluster {
        metadata: cluster.metadata.clone(),
        options: cluster.options.clone(),
        status: Status::default(),
        ssh: cluster.ssh.clone(),
    };
    registry.for_each(|node| {
        if !node.current {
            return;
        }
        added.status.nodes_for_mut(node.master).push(node.clone());
        registry.put(&node.instance_id, node.rollback_record());
    });
    added.status.refresh_counts();
    added
}

/// Comma-joined public addresses of `nodes`, in list order.
pub fn joined_addresses(nodes: &[Node]) -> String {
    nodes
        .iter()
        .flat_map(|n| n.public_ip_address.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",")
}
