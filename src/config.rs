use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Join,
    Delete,
    Ssh,
    Describe,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    pub name: String,
    pub operation: Operation,
    pub master_ips: String,
    pub worker_ips: String,
    pub ssh_user: String,
    pub ssh_port: String,
    pub ssh_key_path: String,
    #[serde(default, skip_serializing)]
    pub ssh_password: String,
    pub state_dir: PathBuf,
    /// Roll back the nodes a failed pass introduced.
    pub rollback_on_failure: bool,
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("operation", &self.operation)
            .field("master_ips", &self.master_ips)
            .field("worker_ips", &self.worker_ips)
            .field("ssh_user", &self.ssh_user)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_key_path", &self.ssh_key_path)
            .field("state_dir", &self.state_dir)
            .field("rollback_on_failure", &self.rollback_on_failure)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "default".into(),
            operation: Operation::Create,
            master_ips: String::new(),
            worker_ips: String::new(),
            ssh_user: String::new(),
            ssh_port: String::new(),
            ssh_key_path: String::new(),
            ssh_password: String::new(),
            state_dir: default_state_dir(),
            rollback_on_failure: true,
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".roster"))
        .unwrap_or_else(|| PathBuf::from(".roster"))
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("roster.toml"))
                .merge(Json::file("roster.json"))
                .merge(Env::prefixed("ROSTER_")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Support Docker-style secrets
        if let Ok(secret_file) = std::env::var("ROSTER_SSH_PASSWORD_FILE") {
            config.ssh_password = std::fs::read_to_string(secret_file)?.trim().to_string();
        }

        Ok(config)
    }

    /// Directory holding this provider's phase markers.
    pub fn marker_dir(&self) -> PathBuf {
        self.state_dir.join(roster::provider::PROVIDER_NAME)
    }
}
