//! Phase markers and committed cluster state.
//!
//! Before a pass touches any node it records a snapshot of the cluster
//! keyed by `(cluster, phase)`. The marker is removed once the pass
//! returns; a marker found later means a pass died half way. A pass that
//! succeeds saves the cluster itself, which the next pass starts from.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::types::{ClusterSnapshot, Phase};

/// Durable storage for phase markers and committed cluster state.
pub trait StateStore: Send + Sync {
    fn write(&self, cluster: &str, phase: Phase, snapshot: &ClusterSnapshot) -> Result<()>;

    fn delete(&self, cluster: &str, phase: Phase) -> Result<()>;

    fn load(&self, cluster: &str, phase: Phase) -> Result<Option<ClusterSnapshot>>;

    /// Saves the committed state of a cluster, replacing the previous one.
    fn save_cluster(&self, snapshot: &ClusterSnapshot) -> Result<()>;

    fn load_cluster(&self, cluster: &str) -> Result<Option<ClusterSnapshot>>;

    /// Phases whose marker is still present for `cluster`.
    fn pending_phases(&self, cluster: &str) -> Result<Vec<Phase>> {
        let mut pending = Vec::new();
        for phase in Phase::ALL {
            if self.load(cluster, phase)?.is_some() {
                pending.push(phase);
            }
        }
        Ok(pending)
    }
}

/// Writes the marker before any risky work. Failure aborts the pass.
pub fn begin_phase(
    store: &dyn StateStore,
    snapshot: &ClusterSnapshot,
    phase: Phase,
) -> Result<()> {
    store.write(&snapshot.metadata.name, phase, snapshot)?;
    info!("recorded {} marker for cluster {}", phase, snapshot.metadata.name);
    Ok(())
}

/// Removes the marker. The work is already done, so failure is only
/// logged.
pub fn end_phase(store: &dyn StateStore, cluster: &str, phase: Phase) {
    if let Err(e) = store.delete(cluster, phase) {
        warn!("failed to remove {} marker for cluster {}: {}", phase, cluster, e);
    }
}

/// Stores markers as YAML files named `<cluster>_<phase>` and committed
/// state as `<cluster>.yaml`, all in one directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(&self, cluster: &str, phase: Phase) -> PathBuf {
        self.dir.join(format!("{}_{}", cluster, phase))
    }

    fn cluster_path(&self, cluster: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", cluster))
    }

    fn persistence(cluster: &str, phase: Phase, source: std::io::Error) -> Error {
        Self::persistence_of(cluster, &format!("{} marker", phase), source)
    }

    fn persistence_of(cluster: &str, what: &str, source: std::io::Error) -> Error {
        Error::Persistence {
            cluster: cluster.to_string(),
            what: what.to_string(),
            source,
        }
    }

    fn read(path: &Path) -> std::io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl StateStore for FileStateStore {
    fn write(&self, cluster: &str, phase: Phase, snapshot: &ClusterSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::persistence(cluster, phase, e))?;
        let body = serde_yaml::to_string(snapshot)?;
        fs::write(self.marker_path(cluster, phase), body)
            .map_err(|e| Self::persistence(cluster, phase, e))
    }

    fn delete(&self, cluster: &str, phase: Phase) -> Result<()> {
        match fs::remove_file(self.marker_path(cluster, phase)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::persistence(cluster, phase, e)),
        }
    }

    fn load(&self, cluster: &str, phase: Phase) -> Result<Option<ClusterSnapshot>> {
        match Self::read(&self.marker_path(cluster, phase)) {
            Ok(Some(body)) => Ok(Some(serde_yaml::from_str(&body)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::persistence(cluster, phase, e)),
        }
    }

    fn save_cluster(&self, snapshot: &ClusterSnapshot) -> Result<()> {
        let cluster = &snapshot.metadata.name;
        fs::create_dir_all(&self.dir).map_err(|e| Self::persistence_of(cluster, "state", e))?;
        let body = serde_yaml::to_string(snapshot)?;
        fs::write(self.cluster_path(cluster), body)
            .map_err(|e| Self::persistence_of(cluster, "state", e))
    }

    fn load_cluster(&self, cluster: &str) -> Result<Option<ClusterSnapshot>> {
        match Self::read(&self.cluster_path(cluster)) {
            Ok(Some(body)) => Ok(Some(serde_yaml::from_str(&body)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::persistence_of(cluster, "state", e)),
        }
    }
}

/// Keeps markers in memory. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    markers: Mutex<HashMap<(String, Phase), ClusterSnapshot>>,
    clusters: Mutex<HashMap<String, ClusterSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn write(&self, cluster: &str, phase: Phase, snapshot: &ClusterSnapshot) -> Result<()> {
        let mut markers = self.markers.lock().unwrap_or_else(|p| p.into_inner());
        markers.insert((cluster.to_string(), phase), snapshot.clone());
        Ok(())
    }

    fn delete(&self, cluster: &str, phase: Phase) -> Result<()> {
        let mut markers = self.markers.lock().unwrap_or_else(|p| p.into_inner());
        markers.remove(&(cluster.to_string(), phase));
        Ok(())
    }

    fn load(&self, cluster: &str, phase: Phase) -> Result<Option<ClusterSnapshot>> {
        let markers = self.markers.lock().unwrap_or_else(|p| p.into_inner());
        Ok(markers.get(&(cluster.to_string(), phase)).cloned())
    }

    fn save_cluster(&self, snapshot: &ClusterSnapshot) -> Result<()> {
        let mut clusters = self.clusters.lock().unwrap_or_else(|p| p.into_inner());
        clusters.insert(snapshot.metadata.name.clone(), snapshot.clone());
        Ok(())
    }

    fn load_cluster(&self, cluster: &str) -> Result<Option<ClusterSnapshot>> {
        let clusters = self.clusters.lock().unwrap_or_else(|p| p.into_inner());
        Ok(clusters.get(cluster).cloned())
    }
}
