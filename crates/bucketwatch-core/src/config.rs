//! bucketwatch.toml configuration parser.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::types::ChangeKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub pubsub: PubsubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Run every watch periodically. When false, runs are only triggered
    /// through the API or the `run` subcommand.
    pub enabled: bool,
    pub interval: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListerBackend {
    /// GCS JSON API (or a compatible emulator).
    Gcs,
    /// Local directories standing in for buckets.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: ListerBackend,
    pub endpoint: String,
    pub bearer_token: Option<String>,
    /// Root directory holding one sub-directory per bucket (local backend).
    pub local_root: Option<PathBuf>,
    pub page_size: u32,
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubsubConfig {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub timeout: String,
    /// Change kinds that produce a message during a run.
    pub publish_on: BTreeSet<ChangeKind>,
    /// Log notifications instead of publishing them.
    pub dry_run: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/bucketwatch"),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: "60s".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: ListerBackend::Gcs,
            endpoint: "https://storage.googleapis.com".to_string(),
            bearer_token: None,
            local_root: None,
            page_size: 1000,
            timeout: "10s".to_string(),
        }
    }
}

impl Default for PubsubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pubsub.googleapis.com".to_string(),
            bearer_token: None,
            timeout: "10s".to_string(),
            publish_on: [ChangeKind::Created, ChangeKind::Updated].into(),
            dry_run: false,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would only fail later, at run time.
    pub fn validate(&self) -> anyhow::Result<()> {
        parse_setting("schedule.interval", &self.schedule.interval)?;
        parse_setting("storage.timeout", &self.storage.timeout)?;
        parse_setting("pubsub.timeout", &self.pubsub.timeout)?;

        if self.schedule_interval() == Duration::ZERO && self.schedule.enabled {
            bail!("schedule.interval must be greater than zero");
        }
        match self.storage.backend {
            ListerBackend::Gcs => check_endpoint("storage.endpoint", &self.storage.endpoint)?,
            ListerBackend::Local => {
                if self.storage.local_root.is_none() {
                    bail!("storage.local_root is required for the local backend");
                }
            }
        }
        if !self.pubsub.dry_run {
            check_endpoint("pubsub.endpoint", &self.pubsub.endpoint)?;
        }
        if self.storage.page_size == 0 {
            bail!("storage.page_size must be greater than zero");
        }
        Ok(())
    }

    pub fn schedule_interval(&self) -> Duration {
        parse_duration(&self.schedule.interval).unwrap_or(Duration::from_secs(60))
    }

    pub fn storage_timeout(&self) -> Duration {
        parse_duration(&self.storage.timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn pubsub_timeout(&self) -> Duration {
        parse_duration(&self.pubsub.timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("bucketwatch.redb")
    }
}

fn parse_setting(name: &str, value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).with_context(|| format!("{name}: invalid duration {value:?}"))
}

fn check_endpoint(name: &str, endpoint: &str) -> anyhow::Result<()> {
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        bail!("{name} must be an https:// or http:// url, got {endpoint:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.schedule_interval(), Duration::from_secs(60));
        assert_eq!(config.storage.backend, ListerBackend::Gcs);
        assert!(config.pubsub.publish_on.contains(&ChangeKind::Created));
        assert!(config.pubsub.publish_on.contains(&ChangeKind::Updated));
        assert!(!config.pubsub.publish_on.contains(&ChangeKind::Deleted));
    }

    #[test]
    fn parses_full_file() {
        let config = DaemonConfig::from_toml(
            r#"
[server]
port = 9090
data_dir = "/tmp/bw"

[schedule]
interval = "5m"

[storage]
backend = "local"
local_root = "/srv/buckets"

[pubsub]
endpoint = "http://pubsub:8085"
publish_on = ["created", "updated", "deleted"]
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/bw/bucketwatch.redb"));
        assert_eq!(config.schedule_interval(), Duration::from_secs(300));
        assert_eq!(config.storage.backend, ListerBackend::Local);
        assert_eq!(config.pubsub.publish_on.len(), 3);
    }

    #[test]
    fn rejects_bad_interval() {
        let err = DaemonConfig::from_toml("[schedule]\ninterval = \"soon\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("schedule.interval"));

        let err = DaemonConfig::from_toml("[schedule]\ninterval = \"307445734561825861m\"\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("schedule.interval"));
    }

    #[test]
    fn local_backend_requires_root() {
        let err = DaemonConfig::from_toml("[storage]\nbackend = \"local\"\n").unwrap_err();
        assert!(err.to_string().contains("local_root"));
    }

    #[test]
    fn accepts_tls_and_plain_endpoints() {
        let config = DaemonConfig::default();
        assert!(config.storage.endpoint.starts_with("https://"));
        assert!(config.pubsub.endpoint.starts_with("https://"));

        let config =
            DaemonConfig::from_toml("[pubsub]\nendpoint = \"http://127.0.0.1:8085\"\n").unwrap();
        assert_eq!(config.pubsub.endpoint, "http://127.0.0.1:8085");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = DaemonConfig::from_toml("[pubsub]\nendpoint = \"ftp://pubsub\"\n").unwrap_err();
        assert!(err.to_string().contains("pubsub.endpoint"));

        let err = DaemonConfig::from_toml("[storage]\nendpoint = \"storage.googleapis.com\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("storage.endpoint"));
    }

    #[test]
    fn dry_run_skips_pubsub_endpoint_check() {
        let config =
            DaemonConfig::from_toml("[pubsub]\nendpoint = \"\"\ndry_run = true\n").unwrap();
        assert!(config.pubsub.dry_run);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = DaemonConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = DaemonConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketwatch.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();
        assert_eq!(DaemonConfig::from_file(&path).unwrap().server.port, 7000);
    }
}
