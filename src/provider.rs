//! The native provider: clusters built from machines that already exist.
//!
//! Nothing is provisioned here. A create or join pass validates the
//! requested addresses, leaves a phase marker behind, merges the nodes
//! into durable [`Status`] and hands the result to an [`Installer`].
//! When a pass fails the host decides which nodes to undo and calls
//! [`NativeProvider::rollback`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};

use crate::error::{DecommissionWarning, Error, Result};
use crate::reconcile::{collect_added, joined_addresses, reconcile};
use crate::registry::NodeRegistry;
use crate::rollback;
use crate::runtime::{Decommissioner, Installer};
use crate::state::{begin_phase, end_phase, StateStore};
use crate::types::{Cluster, Metadata, Options, Phase, Ssh, Status};

pub const PROVIDER_NAME: &str = "native";

pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_SSH_PORT: &str = "22";
pub const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_rsa";

pub struct NativeProvider {
    pub metadata: Metadata,
    pub options: Options,
    pub status: Status,
    pub ssh: Ssh,
    store: Arc<dyn StateStore>,
}

impl NativeProvider {
    pub fn new(name: impl Into<String>, store: Arc<dyn StateStore>) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                provider: PROVIDER_NAME.to_string(),
                context_name: String::new(),
            },
            options: Options::default(),
            status: Status::default(),
            ssh: Ssh::default(),
            store,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Native clusters use their own name as the context name.
    pub fn generate_cluster_name(&mut self) -> String {
        self.metadata.context_name = self.metadata.name.clone();
        self.metadata.context_name.clone()
    }

    pub fn cluster(&self) -> Cluster {
        Cluster {
            metadata: self.metadata.clone(),
            options: self.options.clone(),
            status: self.status.clone(),
            ssh: self.ssh.clone(),
        }
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Restores the committed status saved by the last successful pass.
    /// The requested options are kept. Returns false for a new cluster.
    pub fn load_state(&mut self) -> Result<bool> {
        let snapshot = match self.store.load_cluster(&self.metadata.name)? {
            Some(snapshot) => snapshot,
            None => return Ok(false),
        };
        if self.metadata.context_name.is_empty() {
            self.metadata.context_name = snapshot.metadata.context_name;
        }
        self.status = snapshot.status;
        self.status.refresh_counts();
        info!(
            "[{}] loaded cluster {} with {} master(s) and {} worker(s)",
            PROVIDER_NAME, self.metadata.name, self.status.master_count, self.status.worker_count
        );
        Ok(true)
    }

    fn save_state(&self) -> Result<()> {
        self.store.save_cluster(&self.cluster().snapshot())
    }

    pub fn apply_ssh_defaults(&mut self) {
        if self.ssh.user.is_empty() {
            self.ssh.user = DEFAULT_USER.to_string();
        }
        if self.ssh.port.is_empty() {
            self.ssh.port = DEFAULT_SSH_PORT.to_string();
        }
        if self.ssh.password.is_empty() && self.ssh.key_path.is_empty() {
            self.ssh.key_path = DEFAULT_SSH_KEY_PATH.to_string();
        }
    }

    pub fn create_check(&self) -> Result<()> {
        if self.options.master_ips.is_empty() {
            return Err(Error::configuration(
                PROVIDER_NAME,
                "cluster must have one master when create",
            ));
        }
        self.check_key_path()
    }

    pub fn join_check(&self) -> Result<()> {
        if self.options.master_ips.is_empty() && self.options.worker_ips.is_empty() {
            return Err(Error::configuration(
                PROVIDER_NAME,
                "cluster must have one node when join",
            ));
        }
        self.check_key_path()
    }

    fn check_key_path(&self) -> Result<()> {
        if self.ssh.key_path.is_empty() {
            return Ok(());
        }
        let path = expand_home(&self.ssh.key_path)?;
        if !path.exists() {
            return Err(Error::configuration(
                PROVIDER_NAME,
                format!("ssh key file {} does not exist", path.display()),
            ));
        }
        Ok(())
    }

    /// Runs a create pass over the configured addresses.
    pub async fn create_cluster(
        &mut self,
        registry: &Arc<NodeRegistry>,
        installer: &dyn Installer,
    ) -> Result<()> {
        info!("[{}] executing create logic...", PROVIDER_NAME);
        begin_phase(self.store.as_ref(), &self.cluster().snapshot(), Phase::Creating)?;

        let result = match self.run_create(registry, installer).await {
            Ok(()) => self.save_state(),
            Err(e) => Err(e),
        };
        end_phase(self.store.as_ref(), &self.metadata.name, Phase::Creating);

        match &result {
            Ok(()) => {
                info!("[{}] successfully executed create logic", PROVIDER_NAME);
                info!(
                    "[{}] cluster {} is up with {} master(s) and {} worker(s)",
                    PROVIDER_NAME,
                    self.metadata.name,
                    self.status.master_count,
                    self.status.worker_count
                );
            }
            Err(e) => error!("[{}] failed to create cluster: {}", PROVIDER_NAME, e),
        }
        result
    }

    async fn run_create(
        &mut self,
        registry: &Arc<NodeRegistry>,
        installer: &dyn Installer,
    ) -> Result<()> {
        self.apply_ssh_defaults();
        reconcile(
            &self.options.master_addresses(),
            &self.options.worker_addresses(),
            &self.ssh,
            registry,
            &mut self.status,
        )?;
        let cluster = self.cluster();
        installer.install(&cluster, Arc::clone(registry)).await
    }

    /// Runs a join pass, installing only onto nodes this pass introduced.
    pub async fn join_nodes(
        &mut self,
        registry: &Arc<NodeRegistry>,
        installer: &dyn Installer,
    ) -> Result<()> {
        info!("[{}] executing join logic...", PROVIDER_NAME);
        self.apply_ssh_defaults();
        begin_phase(self.store.as_ref(), &self.cluster().snapshot(), Phase::Upgrading)?;

        let result = match self.run_join(registry, installer).await {
            Ok(()) => self.save_state(),
            Err(e) => Err(e),
        };
        end_phase(self.store.as_ref(), &self.metadata.name, Phase::Upgrading);

        match &result {
            Ok(()) => info!("[{}] successfully executed join logic", PROVIDER_NAME),
            Err(e) => error!("[{}] failed to join nodes: {}", PROVIDER_NAME, e),
        }
        result
    }

    async fn run_join(
        &mut self,
        registry: &Arc<NodeRegistry>,
        installer: &dyn Installer,
    ) -> Result<()> {
        reconcile(
            &self.options.master_addresses(),
            &self.options.worker_addresses(),
            &self.ssh,
            registry,
            &mut self.status,
        )?;
        self.refresh_address_options();

        let cluster = self.cluster();
        let added = collect_added(registry, &cluster);
        installer.join(&cluster, &added, Arc::clone(registry)).await
    }

    fn refresh_address_options(&mut self) {
        self.options.master_ips = joined_addresses(&self.status.master_nodes);
        self.options.worker_ips = joined_addresses(&self.status.worker_nodes);
    }

    /// Decommissions the given nodes and drops every one that was torn
    /// down from durable status. Failures are logged and returned.
    pub async fn rollback(
        &mut self,
        ids: &[String],
        registry: &NodeRegistry,
        decommissioner: &dyn Decommissioner,
    ) -> Vec<DecommissionWarning> {
        info!("[{}] rolling back {} node(s)", PROVIDER_NAME, ids.len());
        let warnings = rollback::rollback(ids, registry, decommissioner).await;
        for w in &warnings {
            warn!("[{}] {}", PROVIDER_NAME, w);
        }

        let failed: HashSet<&str> = warnings.iter().map(|w| w.instance_id.as_str()).collect();
        let removed: HashSet<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| !failed.contains(id) && registry.get(id).is_some())
            .collect();
        self.status
            .master_nodes
            .retain(|n| !removed.contains(n.instance_id.as_str()));
        self.status
            .worker_nodes
            .retain(|n| !removed.contains(n.instance_id.as_str()));
        self.status.refresh_counts();
        self.refresh_address_options();
        warnings
    }

    pub fn delete_cluster(&self, _force: bool) -> Result<()> {
        Err(self.command_not_supported("delete"))
    }

    pub fn ssh_node(&self, _ip: &str) -> Result<()> {
        Err(self.command_not_supported("ssh"))
    }

    pub fn describe_cluster(&self) -> Result<()> {
        Err(self.command_not_supported("describe"))
    }

    pub fn get_cluster(&self) -> Result<()> {
        Err(self.command_not_supported("get"))
    }

    pub fn command_not_supported(&self, command: &str) -> Error {
        Error::UnsupportedOperation {
            provider: PROVIDER_NAME.to_string(),
            command: command.to_string(),
        }
    }

    /// Native nodes are never discovered from a cloud API.
    pub fn is_cluster_exist(&self) -> (bool, Vec<String>) {
        (false, Vec::new())
    }

    pub fn provider_options(&self, json: &[u8]) -> Result<Options> {
        Ok(serde_json::from_slice(json)?)
    }

    pub fn set_options(&mut self, json: &[u8]) -> Result<()> {
        let options = self.provider_options(json)?;
        self.options.merge(options);
        Ok(())
    }

    /// Loads a stored cluster description: identity, credentials and
    /// committed status, with its options merged over the current ones.
    pub fn set_config(&mut self, json: &[u8]) -> Result<()> {
        let config: Cluster = serde_json::from_slice(json)?;
        if !config.metadata.name.is_empty() {
            self.metadata.name = config.metadata.name;
        }
        if !config.metadata.context_name.is_empty() {
            self.metadata.context_name = config.metadata.context_name;
        }
        merge_ssh(&mut self.ssh, config.ssh);
        self.status = config.status;
        self.status.refresh_counts();
        self.options.merge(config.options);
        Ok(())
    }
}

fn merge_ssh(target: &mut Ssh, other: Ssh) {
    if !other.user.is_empty() {
        target.user = other.user;
    }
    if !other.port.is_empty() {
        target.port = other.port;
    }
    if !other.key_path.is_empty() {
        target.key_path = other.key_path;
    }
    if !other.password.is_empty() {
        target.password = other.password;
    }
}

/// Expands a leading `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::configuration(PROVIDER_NAME, "failed to get user home directory")
            })?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
