//! Data structures describing a cluster of pre-existing machines.
//!
//! These types are serialised using [`serde`](https://serde.rs/) and end
//! up in phase-marker snapshots and in the plan handed to the installer.
//! A node's identity is derived from its address, so the same machine
//! always maps to the same record across passes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote shell credentials for a node.
///
/// The password is accepted on input but never written back out, so it
/// cannot leak into a persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssh {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_path: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

/// One cluster member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub instance_id: String,
    pub master: bool,
    /// Set while the node was (re-)introduced by the pass in flight.
    #[serde(default)]
    pub current: bool,
    /// Set while the node may still be undone by a rollback.
    #[serde(default)]
    pub rollback: bool,
    #[serde(default)]
    pub instance_status: String,
    #[serde(default)]
    pub internal_ip_address: Vec<String>,
    #[serde(default)]
    pub public_ip_address: Vec<String>,
    #[serde(default)]
    pub ssh: Ssh,
}

impl Node {
    /// Reduced copy kept around so a later rollback can still reach the
    /// node. Only identity, role, addresses and credentials survive.
    pub fn rollback_record(&self) -> Node {
        Node {
            instance_id: self.instance_id.clone(),
            master: self.master,
            current: false,
            rollback: true,
            instance_status: self.instance_status.clone(),
            internal_ip_address: self.internal_ip_address.clone(),
            public_ip_address: self.public_ip_address.clone(),
            ssh: self.ssh.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_name: String,
}

/// Provider options. The address lists are comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub master_ips: String,
    #[serde(default)]
    pub worker_ips: String,
}

impl Options {
    /// Overlays every non-empty field of `other` onto `self`.
    pub fn merge(&mut self, other: Options) {
        if !other.master_ips.is_empty() {
            self.master_ips = other.master_ips;
        }
        if !other.worker_ips.is_empty() {
            self.worker_ips = other.worker_ips;
        }
    }

    pub fn master_addresses(&self) -> Vec<String> {
        split_addresses(&self.master_ips)
    }

    pub fn worker_addresses(&self) -> Vec<String> {
        split_addresses(&self.worker_ips)
    }
}

fn split_addresses(list: &str) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(',').map(|s| s.trim().to_string()).collect()
}

/// Durable membership: committed nodes and their derived counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub master_nodes: Vec<Node>,
    #[serde(default)]
    pub worker_nodes: Vec<Node>,
    #[serde(default)]
    pub master_count: usize,
    #[serde(default)]
    pub worker_count: usize,
}

impl Status {
    pub fn nodes_for(&self, master: bool) -> &Vec<Node> {
        if master {
            &self.master_nodes
        } else {
            &self.worker_nodes
        }
    }

    pub fn nodes_for_mut(&mut self, master: bool) -> &mut Vec<Node> {
        if master {
            &mut self.master_nodes
        } else {
            &mut self.worker_nodes
        }
    }

    pub fn position(&self, master: bool, instance_id: &str) -> Option<usize> {
        self.nodes_for(master)
            .iter()
            .position(|n| n.instance_id == instance_id)
    }

    pub fn refresh_counts(&mut self) {
        self.master_count = self.master_nodes.len();
        self.worker_count = self.worker_nodes.len();
    }
}

/// Everything the installer needs to act on a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub metadata: Metadata,
    pub options: Options,
    pub status: Status,
    #[serde(default)]
    pub ssh: Ssh,
}

impl Cluster {
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            metadata: self.metadata.clone(),
            options: self.options.clone(),
            status: self.status.clone(),
        }
    }
}

/// What a phase marker records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub metadata: Metadata,
    pub options: Options,
    pub status: Status,
}

/// Operation in flight while a phase marker exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Creating,
    Upgrading,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Creating, Phase::Upgrading];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Creating => "creating",
            Phase::Upgrading => "upgrading",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
