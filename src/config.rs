//! Configuration management for kb_light_statsd.
//!
//! Handles loading, parsing, and validation of the YAML configuration file
//! that selects which metric drives which keyboard zone.

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    color::{Color, Zone},
    stats::Thresholds,
};

/// Main configuration structure for the daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// service:
///   dim_delay: 10
///   polling_interval: 60
///   def_color: blue
/// thresholds:
///   green: 40
///   yellow: 60
/// stats:
///   cpu: left
///   memory: center
///   gpu: right
/// driver:
///   location: /sys/module/tuxedo_wmi/parameters/
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    #[serde(default)]
    pub service: ServiceCfg,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Which zone shows which metric.
    #[serde(default)]
    pub stats: StatsCfg,

    #[serde(default)]
    pub driver: DriverCfg,

    #[serde(default)]
    pub dbus: DBusCfg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCfg {
    /// Seconds from going idle to the backlight switching off.
    #[serde(default = "defaults::dim_delay")]
    pub dim_delay: u32,

    /// Seconds between two stats polls.
    #[serde(default = "defaults::polling_interval")]
    pub polling_interval: u32,

    /// Colour painted on every zone at shutdown.
    #[serde(default = "defaults::def_color")]
    pub def_color: Color,
}

/// Zone per metric. An absent, null or empty entry leaves the metric off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCfg {
    #[serde(default, deserialize_with = "optional_zone")]
    pub cpu: Option<Zone>,
    #[serde(default, deserialize_with = "optional_zone")]
    pub memory: Option<Zone>,
    #[serde(default, deserialize_with = "optional_zone")]
    pub gpu: Option<Zone>,
}

impl StatsCfg {
    fn mapped(&self) -> impl Iterator<Item = (&'static str, Zone)> + '_ {
        [("cpu", self.cpu), ("memory", self.memory), ("gpu", self.gpu)]
            .into_iter()
            .filter_map(|(metric, zone)| zone.map(|zone| (metric, zone)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCfg {
    /// Directory holding the `kb_*` parameter files.
    #[serde(default = "defaults::driver_location")]
    pub location: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBusCfg {
    /// Publish the status object on the session bus.
    #[serde(default = "defaults::dbus_enabled")]
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceCfg::default(),
            thresholds: Thresholds::default(),
            stats: StatsCfg::default(),
            driver: DriverCfg::default(),
            dbus: DBusCfg::default(),
        }
    }
}

impl Default for ServiceCfg {
    fn default() -> Self {
        Self {
            dim_delay: defaults::dim_delay(),
            polling_interval: defaults::polling_interval(),
            def_color: defaults::def_color(),
        }
    }
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            location: defaults::driver_location(),
        }
    }
}

impl Default for DBusCfg {
    fn default() -> Self {
        Self {
            enabled: defaults::dbus_enabled(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kb_light_statsd::config::Config;
    ///
    /// let config = Config::default();
    /// config.validate()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn validate(&self) -> Result<()> {
        let Thresholds { green, yellow } = self.thresholds;
        if green >= yellow {
            bail!("Green threshold {green} must be below yellow threshold {yellow}");
        }
        if yellow > 100 {
            bail!("Yellow threshold {yellow} exceeds 100%");
        }
        if self.service.polling_interval == 0 {
            bail!("Polling interval must be at least one second");
        }

        let mut owners: HashMap<Zone, &str> = HashMap::new();
        for (metric, zone) in self.stats.mapped() {
            if let Some(previous) = owners.insert(zone, metric) {
                bail!("Zone '{zone}' is mapped to both '{previous}' and '{metric}'");
            }
        }

        Ok(())
    }
}

fn optional_zone<'de, D>(deserializer: D) -> Result<Option<Zone>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::color::Color;

    pub fn dim_delay() -> u32 {
        10
    }

    pub fn polling_interval() -> u32 {
        60
    }

    pub fn def_color() -> Color {
        Color::Blue
    }

    pub fn driver_location() -> PathBuf {
        PathBuf::from("/sys/module/tuxedo_wmi/parameters/")
    }

    pub fn dbus_enabled() -> bool {
        true
    }
}

fn locate_config() -> Result<PathBuf> {
    if let Ok(env_path) = env::var("KB_LIGHT_STATSD_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("kb_light_statsd/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    let etc = Path::new("/etc/kb_light_statsd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    bail!("Configuration file not found in any standard location")
}

/// Loaded configuration together with the file it came from.
///
/// The configuration is read once at startup and shared read-only.
///
/// # Example
///
/// ```no_run
/// use kb_light_statsd::config::ConfigManager;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(None).await?;
/// let dim_delay = config_manager.config().service.dim_delay;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<Config>,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. KB_LIGHT_STATSD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/kb_light_statsd/config.yml or ~/.config/kb_light_statsd/config.yml
    /// 4. /etc/kb_light_statsd/config.yml
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path)?;

        Ok(Self::new(config, config_path))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the configuration.
    pub fn shared(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}
