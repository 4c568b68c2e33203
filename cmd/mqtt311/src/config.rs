//! Configuration file for the mqtt311 CLI.
//!
//! Looked up at `--config <path>` or ~/.giztoy/mqtt311/config.yaml. A missing
//! default file is not an error; a missing `--config` file is.
//!
//! ```yaml
//! host: broker.local
//! port: 1883
//! topic: sensors/temp
//! qos: 1
//! connect:
//!   client_id: sensor-1
//!   username: admin
//!   password: secret
//!   keep_alive: 30
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use giztoy_mqtt311::{ConnectOptions, QoS};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".giztoy";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const APP_NAME: &str = "mqtt311";

/// Settings read from the YAML file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Broker host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Broker port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Topic to subscribe and publish on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Subscription QoS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<QoS>,

    /// CONNECT options.
    #[serde(default)]
    pub connect: ConnectOptions,

    /// Path the config was read from (not serialized).
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(APP_NAME).join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the path the config was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut cfg: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.config_path = Some(path.to_path_buf());
        Ok(cfg)
    }
}

/// Loads the configuration.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    if let Some(p) = custom_path {
        return Config::read(Path::new(p));
    }

    match Config::default_config_path() {
        Some(path) if path.exists() => Config::read(&path),
        _ => Ok(Config::default()),
    }
}

/// Masks a secret for display.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let yaml = r#"
host: broker.local
port: 8883
topic: sensors/temp
qos: 1
connect:
  client_id: sensor-1
  username: admin
  keep_alive: 30
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.host.as_deref(), Some("broker.local"));
        assert_eq!(cfg.port, Some(8883));
        assert_eq!(cfg.qos, Some(QoS::AtLeastOnce));
        assert_eq!(cfg.connect.client_id, "sensor-1");
        assert_eq!(cfg.connect.keep_alive, 30);
        assert!(cfg.connect.clean_session);
    }

    #[test]
    fn test_empty_file() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.host.is_none());
        assert_eq!(cfg.connect, ConnectOptions::default());
    }

    #[test]
    fn test_load_custom_path() {
        let path = std::env::temp_dir().join(format!("mqtt311-cli-{}.yaml", std::process::id()));
        std::fs::write(&path, "host: 10.0.0.2\ntopic: a/b\n").unwrap();

        let cfg = load_config(path.to_str()).unwrap();
        assert_eq!(cfg.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cfg.path(), Some(path.as_path()));

        std::fs::remove_file(&path).unwrap();
        assert!(load_config(path.to_str()).is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("supersecret"), "su*******et");
    }
}
