//! Configuration management

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dashlink_broadcaster::{DashboardSettings, LogLevel};
use serde::{Deserialize, Serialize};

/// Fastest supported broadcast tick
const MAX_TICK_RATE_HZ: u32 = 1000;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Dashboard listen port
    pub port: u16,

    /// Dashboard listen address
    pub bind_address: String,

    /// Broadcast ticks per second
    pub tick_rate_hz: u32,

    /// Ticks slower than this are logged as a warning
    pub frame_time_threshold_ms: u64,

    /// Period of the log topic flush
    pub log_flush_interval_ms: u64,

    /// Minimum level forwarded to dashboard log queues
    pub dashboard_log_level: LogLevel,

    /// Match values and autonomous selector options
    pub webdashboard: DashboardSettings,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            port: 5801,
            bind_address: "0.0.0.0".to_string(),
            tick_rate_hz: 60,
            frame_time_threshold_ms: 20,
            log_flush_interval_ms: 250,
            dashboard_log_level: LogLevel::Info,
            webdashboard: DashboardSettings::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from `path` (or the default location).
    ///
    /// A missing file is created with defaults. The result is validated.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_config_path);

        let config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

            config.config_path = config_path;
            config
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        dashlink_paths::ensure_parent_dir(&self.config_path)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_hz == 0 {
            bail!("tick_rate_hz must be greater than zero");
        }
        if self.tick_rate_hz > MAX_TICK_RATE_HZ {
            bail!("tick_rate_hz must be at most {}", MAX_TICK_RATE_HZ);
        }
        if self.log_flush_interval_ms == 0 {
            bail!("log_flush_interval_ms must be greater than zero");
        }

        self.bind_ip()?;
        self.webdashboard
            .validate()
            .context("Invalid [webdashboard] settings")?;

        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("Invalid bind_address: {}", self.bind_address))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.bind_ip()?, self.port))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    pub fn frame_time_threshold(&self) -> Duration {
        Duration::from_millis(self.frame_time_threshold_ms)
    }

    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_millis(self.log_flush_interval_ms)
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dashlink_paths::get_config_file().unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashlink_broadcaster::{MatchValueSpec, MatchValueType};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, 5801);
        assert_eq!(config.tick_rate_hz, 60);
        assert_eq!(config.log_flush_interval(), Duration::from_millis(250));
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:5801");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = DaemonConfig::load(Some(path.clone())).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.port, 5801);

        // Second load reads the written file back
        let reloaded = DaemonConfig::load(Some(path)).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_parse_webdashboard_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
port = 6000
dashboard_log_level = "warn"

[[webdashboard.match_values]]
key = "ips_selected_auto"
type = "auto"
display_name = "Selected Auto"

[[webdashboard.match_values]]
key = "ipn_speed"
type = "dial"
min = 0.0
max = 5.0

[webdashboard.auto_selector]
origins = ["Left", "Right"]
destinations = ["Scale"]
actions = ["Score"]
"#,
        )
        .unwrap();

        let config = DaemonConfig::load(Some(path)).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.dashboard_log_level, LogLevel::Warn);
        assert_eq!(
            config.webdashboard.match_values,
            vec![
                MatchValueSpec::new("ips_selected_auto", MatchValueType::Auto).with_display_name("Selected Auto"),
                MatchValueSpec::new("ipn_speed", MatchValueType::Dial).with_range(0.0, 5.0),
            ]
        );
        assert_eq!(config.webdashboard.auto_selector.origins, vec!["Left", "Right"]);
    }

    #[test]
    fn test_unknown_match_type_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[webdashboard.match_values]]\nkey = \"x\"\ntype = \"gauge\"\n",
        )
        .unwrap();

        assert!(DaemonConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_tick_rate_upper_bound() {
        let mut config = DaemonConfig::default();
        config.tick_rate_hz = MAX_TICK_RATE_HZ;
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(1));

        config.tick_rate_hz = 1_000_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_rate_hz"));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = DaemonConfig::default();
        config.tick_rate_hz = 0;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.webdashboard.auto_selector.actions = vec!["a~b".to_string()];
        assert!(config.validate().is_err());
    }
}
