use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roster::runtime::{Decommissioner, DryRunRuntime, Installer};
use roster::state::{FileStateStore, StateStore};
use roster::types::{Cluster, Node, Phase};
use roster::{DecommissionWarning, NativeProvider, NodeRegistry, Result};

/// Remembers what it was asked to install and fails teardown for chosen
/// nodes.
#[derive(Default)]
struct RecordingRuntime {
    added: Mutex<Option<Cluster>>,
    merged: Mutex<Option<Cluster>>,
    fail_decommission: Vec<String>,
}

#[async_trait]
impl Installer for RecordingRuntime {
    async fn install(&self, cluster: &Cluster, _registry: Arc<NodeRegistry>) -> Result<()> {
        *self.merged.lock().unwrap() = Some(cluster.clone());
        Ok(())
    }

    async fn join(
        &self,
        cluster: &Cluster,
        added: &Cluster,
        _registry: Arc<NodeRegistry>,
    ) -> Result<()> {
        *self.merged.lock().unwrap() = Some(cluster.clone());
        *self.added.lock().unwrap() = Some(added.clone());
        Ok(())
    }
}

#[async_trait]
impl Decommissioner for RecordingRuntime {
    async fn decommission(&self, nodes: &[Node]) -> Vec<DecommissionWarning> {
        nodes
            .iter()
            .filter(|n| self.fail_decommission.contains(&n.instance_id))
            .map(|n| DecommissionWarning::new(&n.instance_id, "ssh: connection refused"))
            .collect()
    }
}

fn provider(dir: &tempfile::TempDir) -> NativeProvider {
    let store = Arc::new(FileStateStore::new(dir.path().join("native")));
    let mut p = NativeProvider::new("demo", store);
    p.ssh.password = "secret".into();
    p
}

#[tokio::test]
async fn create_with_single_master() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = provider(&dir);
    p.options.master_ips = "1.2.3.4".into();
    p.create_check().unwrap();

    let registry = Arc::new(NodeRegistry::new());
    let runtime = RecordingRuntime::default();
    p.create_cluster(&registry, &runtime).await.unwrap();

    let seeded = registry.get("1-2-3-4").unwrap();
    assert!(seeded.master);
    assert!(seeded.current);
    assert_eq!(registry.len(), 1);

    assert_eq!(p.status.master_nodes.len(), 1);
    assert_eq!(p.status.master_nodes[0].instance_id, "1-2-3-4");
    assert_eq!(p.status.master_count, 1);
    assert_eq!(p.status.worker_count, 0);
    assert_eq!(p.status.master_nodes[0].ssh.user, "root");

    let merged = runtime.merged.lock().unwrap().clone().unwrap();
    assert_eq!(merged.status, p.status);
    assert!(p.store().pending_phases("demo").unwrap().is_empty());
}

#[tokio::test]
async fn join_workers_to_existing_master() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = provider(&dir);
    p.options.master_ips = "1.2.3.4".into();
    p.create_cluster(&Arc::new(NodeRegistry::new()), &DryRunRuntime::new())
        .await
        .unwrap();

    p.options.master_ips.clear();
    p.options.worker_ips = "5.6.7.8,5.6.7.9".into();
    p.join_check().unwrap();

    let registry = Arc::new(NodeRegistry::new());
    let runtime = RecordingRuntime::default();
    p.join_nodes(&registry, &runtime).await.unwrap();

    assert_eq!(p.status.master_nodes.len(), 1);
    assert_eq!(p.status.worker_nodes.len(), 2);
    assert_eq!(p.status.worker_count, 2);
    assert_eq!(p.options.master_ips, "1.2.3.4");
    assert_eq!(p.options.worker_ips, "5.6.7.8,5.6.7.9");

    let added = runtime.added.lock().unwrap().clone().unwrap();
    assert!(added.status.master_nodes.is_empty());
    let ids: Vec<_> = added
        .status
        .worker_nodes
        .iter()
        .map(|n| n.instance_id.as_str())
        .collect();
    assert_eq!(ids, vec!["5-6-7-8", "5-6-7-9"]);

    let merged = runtime.merged.lock().unwrap().clone().unwrap();
    assert_eq!(merged.options.worker_ips, "5.6.7.8,5.6.7.9");
    assert!(p.store().pending_phases("demo").unwrap().is_empty());
}

#[tokio::test]
async fn rejoining_committed_nodes_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = provider(&dir);
    p.options.master_ips = "1.2.3.4".into();
    p.options.worker_ips = "5.6.7.8".into();
    p.create_cluster(&Arc::new(NodeRegistry::new()), &DryRunRuntime::new())
        .await
        .unwrap();

    let registry = Arc::new(NodeRegistry::new());
    let runtime = RecordingRuntime::default();
    p.join_nodes(&registry, &runtime).await.unwrap();

    assert_eq!(p.status.master_count, 1);
    assert_eq!(p.status.worker_count, 1);
    let added = runtime.added.lock().unwrap().clone().unwrap();
    assert!(added.status.master_nodes.is_empty());
    assert!(added.status.worker_nodes.is_empty());
    assert!(registry.rollback_candidates().is_empty());
}

#[tokio::test]
async fn rollback_keeps_nodes_that_failed_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = provider(&dir);
    p.options.master_ips = "1.2.3.4".into();
    p.create_cluster(&Arc::new(NodeRegistry::new()), &DryRunRuntime::new())
        .await
        .unwrap();

    p.options.worker_ips = "5.6.7.8,5.6.7.9,5.6.7.10".into();
    let registry = Arc::new(NodeRegistry::new());
    p.join_nodes(&registry, &DryRunRuntime::new()).await.unwrap();
    assert_eq!(p.status.worker_count, 3);

    let runtime = RecordingRuntime {
        fail_decommission: vec!["5-6-7-9".into()],
        ..Default::default()
    };
    let mut ids = registry.rollback_candidates();
    ids.push("9-9-9-9".into());
    let warnings = p.rollback(&ids, &registry, &runtime).await;

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].instance_id, "5-6-7-9");
    assert_eq!(p.status.master_count, 1);
    assert_eq!(p.status.worker_count, 1);
    assert_eq!(p.status.worker_nodes[0].instance_id, "5-6-7-9");
    assert_eq!(p.options.worker_ips, "5.6.7.9");
}

#[tokio::test]
async fn marker_snapshot_omits_password() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path());
    let mut p = provider(&dir);
    p.options.master_ips = "1.2.3.4".into();
    p.create_cluster(&Arc::new(NodeRegistry::new()), &DryRunRuntime::new())
        .await
        .unwrap();

    let snapshot = p.cluster().snapshot();
    store.write("demo", Phase::Upgrading, &snapshot).unwrap();
    let body = std::fs::read_to_string(dir.path().join("demo_upgrading")).unwrap();
    assert!(body.contains("1-2-3-4"));
    assert!(!body.contains("secret"));
    assert_eq!(store.pending_phases("demo").unwrap(), vec![Phase::Upgrading]);
}

#[tokio::test]
async fn join_in_a_new_process_sees_committed_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = provider(&dir);
    first.options.master_ips = "1.2.3.4".into();
    first
        .create_cluster(&Arc::new(NodeRegistry::new()), &DryRunRuntime::new())
        .await
        .unwrap();
    let saved = std::fs::read_to_string(dir.path().join("native").join("demo.yaml")).unwrap();
    assert!(saved.contains("1-2-3-4"));
    assert!(!saved.contains("secret"));

    let mut second = provider(&dir);
    second.options.worker_ips = "5.6.7.8".into();
    assert!(second.load_state().unwrap());

    let registry = Arc::new(NodeRegistry::new());
    let runtime = RecordingRuntime::default();
    second.join_nodes(&registry, &runtime).await.unwrap();

    let merged = runtime.merged.lock().unwrap().clone().unwrap();
    assert_eq!(merged.options.master_ips, "1.2.3.4");
    assert_eq!(merged.options.worker_ips, "5.6.7.8");
    assert_eq!(registry.rollback_candidates(), vec!["5-6-7-8"]);

    let mut third = provider(&dir);
    assert!(third.load_state().unwrap());
    assert_eq!(third.status.master_count, 1);
    assert_eq!(third.status.worker_count, 1);
}
