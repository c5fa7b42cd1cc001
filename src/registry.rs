//! Transient node registry for a single create or join pass.
//!
//! The registry is shared between the pass driver and the per-node
//! installer tasks, which update status and address fields while the pass
//! is in flight. Writes are last-writer-wins per key.

use dashmap::DashMap;

use crate::types::Node;

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: DashMap<String, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `node` under `id`, replacing whatever was there.
    pub fn put(&self, id: &str, node: Node) {
        self.nodes.insert(id.to_string(), node);
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    /// Applies `f` to the entry for `id` in place. Returns false when the
    /// id is unknown.
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Node),
    {
        match self.nodes.get_mut(id) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Point-in-time copy of every record, ordered by instance id.
    pub fn snapshot(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        nodes
    }

    /// Visits every record of a snapshot taken at call time. The shard
    /// locks are released before the visitor runs, so it may `put` the key
    /// it is visiting without deadlocking.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Node),
    {
        for node in self.snapshot() {
            visitor(&node);
        }
    }

    /// Ids of records still eligible for rollback.
    pub fn rollback_candidates(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|n| n.rollback)
            .map(|n| n.instance_id)
            .collect()
    }
}
