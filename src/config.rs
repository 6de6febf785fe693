//! Connection settings loaded from `remote-slurm.toml`.
//!
//! Values not present in the file use defaults; the `REMOTE_SLURM_HOST`
//! environment variable takes precedence over the file for the host.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Failures while loading connection settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no remote host configured (set `host` in remote-slurm.toml or REMOTE_SLURM_HOST)")]
    MissingHost,
}

/// Settings for reaching the cluster's login node.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Hostname or address of the submit node.
    pub host: String,

    /// Login user; omitted means the ssh client picks its own default.
    #[serde(default)]
    pub user: Option<String>,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Private key passed to the ssh client with `-i`.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

impl RemoteConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: default_port(),
            identity_file: None,
        }
    }

    /// Load settings from `remote-slurm.toml` in the current directory.
    ///
    /// A missing file is fine as long as `REMOTE_SLURM_HOST` is set; the
    /// environment variable also overrides a host from the file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("remote-slurm.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Some(toml::from_str::<RemoteConfig>(&contents)?)
        } else {
            None
        };

        if let Ok(host) = std::env::var("REMOTE_SLURM_HOST")
            && !host.is_empty()
        {
            match &mut config {
                Some(c) => c.host = host,
                None => config = Some(Self::new(host)),
            }
        }

        config.ok_or(ConfigError::MissingHost)
    }

    /// The `[user@]host` destination handed to ssh/scp.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn deserialize_partial_toml_uses_defaults() {
        let config: RemoteConfig = toml::from_str(r#"host = "login.cluster.example""#).unwrap();
        assert_eq!(config.host, "login.cluster.example");
        assert_eq!(config.port, 22);
        assert!(config.user.is_none());
        assert!(config.identity_file.is_none());
    }

    #[test]
    fn deserialize_full_toml() {
        let config: RemoteConfig = toml::from_str(
            r#"
            host = "login.cluster.example"
            user = "alice"
            port = 2222
            identity_file = "/home/alice/.ssh/id_ed25519"
            "#,
        )
        .unwrap();
        assert_eq!(config.destination(), "alice@login.cluster.example");
        assert_eq!(config.port, 2222);
        assert_eq!(
            config.identity_file.as_deref(),
            Some(Path::new("/home/alice/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn destination_without_user_is_bare_host() {
        assert_eq!(RemoteConfig::new("node1").destination(), "node1");
    }

    #[test]
    fn load_from_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"hpc.example.org\"").unwrap();
        writeln!(file, "user = \"bob\"").unwrap();

        let config = RemoteConfig::load_from(file.path()).unwrap();
        assert_eq!(config.destination(), "bob@hpc.example.org");
    }
}
