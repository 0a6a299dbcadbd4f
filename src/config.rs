//! Client configuration.
//!
//! Defaults, then an optional JSON file, then environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::DEFAULT_METADATA_URL;

pub const ENV_REGISTRY: &str = "FLEETNAME_REGISTRY";
pub const ENV_INFO: &str = "FLEETNAME_INFO";
pub const ENV_METADATA_URL: &str = "FLEETNAME_METADATA_URL";
pub const ENV_HOSTS: &str = "FLEETNAME_HOSTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared registry directory.
    /// Default: /var/lib/fleetname
    pub registry_dir: PathBuf,

    /// Host-type declaration file.
    /// Default: /etc/fleetname_info
    pub host_info_path: PathBuf,

    /// Base URL of the instance metadata service.
    pub metadata_url: String,

    /// Delay between metadata polls while the identity is incomplete.
    /// Default: 1000 ms
    pub metadata_poll_ms: u64,

    pub hosts_path: PathBuf,

    /// Hand-maintained entries kept ahead of the managed block.
    /// Default: /etc/hosts.legacy
    pub legacy_hosts_path: PathBuf,

    pub hostname_file: PathBuf,

    /// Hosts refresh period in daemon mode.
    /// Default: 60 s
    pub update_interval_secs: u64,

    pub offline_instance_id: String,
    pub offline_local_ip: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from("/var/lib/fleetname"),
            host_info_path: PathBuf::from("/etc/fleetname_info"),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            metadata_poll_ms: 1000,
            hosts_path: PathBuf::from("/etc/hosts"),
            legacy_hosts_path: PathBuf::from("/etc/hosts.legacy"),
            hostname_file: PathBuf::from("/etc/hostname"),
            update_interval_secs: 60,
            offline_instance_id: "test-instance".to_string(),
            offline_local_ip: "test_local_ip".to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if given (missing fields take defaults), then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_REGISTRY) {
            self.registry_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_INFO) {
            self.host_info_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_METADATA_URL) {
            self.metadata_url = value;
        }
        if let Some(value) = lookup(ENV_HOSTS) {
            self.hosts_path = PathBuf::from(value);
        }
    }
}
