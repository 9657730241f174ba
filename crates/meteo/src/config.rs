//! Driver configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeteoConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Timing of the connect/read loop and the USB session
    #[serde(default)]
    pub driver: DriverSettings,
    /// Wait-for-connection behaviour of the lifecycle guard
    #[serde(default)]
    pub startup: StartupSettings,
    /// Reporting options of the `ypmeteo` binary
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Timing of the driver loop and the USB session
///
/// Durations are written as strings such as `"50ms"`, `"1s"` or `"1m30s"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Timeout of each streaming read
    #[serde(default = "DriverSettings::default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,
    /// Timeout of each read while draining stale data on connect
    #[serde(default = "DriverSettings::default_flush_timeout", with = "duration_serde")]
    pub flush_timeout: Duration,
    /// Timeout of each command write
    #[serde(default = "DriverSettings::default_write_timeout", with = "duration_serde")]
    pub write_timeout: Duration,
    /// Pause after a failed connect attempt or a broken read
    #[serde(default = "DriverSettings::default_connect_backoff", with = "duration_serde")]
    pub connect_backoff: Duration,
    /// Pause after a completed connect attempt, before the first read
    #[serde(default = "DriverSettings::default_connect_settle", with = "duration_serde")]
    pub connect_settle: Duration,
    /// Delay after releasing the device so the OS lets go of it
    #[serde(default = "DriverSettings::default_release_delay", with = "duration_serde")]
    pub release_delay: Duration,
    /// Upper bound on reads while draining stale data
    #[serde(default = "DriverSettings::default_max_flush_reads")]
    pub max_flush_reads: u32,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            read_timeout: Self::default_read_timeout(),
            flush_timeout: Self::default_flush_timeout(),
            write_timeout: Self::default_write_timeout(),
            connect_backoff: Self::default_connect_backoff(),
            connect_settle: Self::default_connect_settle(),
            release_delay: Self::default_release_delay(),
            max_flush_reads: Self::default_max_flush_reads(),
        }
    }
}

impl DriverSettings {
    fn default_read_timeout() -> Duration {
        Duration::from_millis(50)
    }

    fn default_flush_timeout() -> Duration {
        Duration::from_millis(50)
    }

    fn default_write_timeout() -> Duration {
        Duration::from_secs(1)
    }

    fn default_connect_backoff() -> Duration {
        Duration::from_secs(1)
    }

    fn default_connect_settle() -> Duration {
        Duration::from_secs(5)
    }

    fn default_release_delay() -> Duration {
        Duration::from_millis(100)
    }

    fn default_max_flush_reads() -> u32 {
        1024
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupSettings {
    /// Give up waiting for the first connection after this long (None = wait forever)
    #[serde(default, with = "duration_serde::option")]
    pub connect_timeout: Option<Duration>,
    /// Interval between connectivity checks while waiting
    #[serde(default = "StartupSettings::default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            poll_interval: Self::default_poll_interval(),
        }
    }
}

impl StartupSettings {
    fn default_poll_interval() -> Duration {
        Duration::from_millis(100)
    }

    /// Default settings with the given connect timeout
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout: timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// How often the binary prints a reading
    #[serde(default = "OutputSettings::default_interval", with = "duration_serde")]
    pub interval: Duration,
    /// Print JSON objects instead of the plain environment string
    #[serde(default)]
    pub json: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
            json: false,
        }
    }
}

impl OutputSettings {
    fn default_interval() -> Duration {
        Duration::from_secs(10)
    }
}

/// Custom serde module for Duration
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        format_duration(*duration).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Same format for optional durations
    pub mod option {
        use super::{format_duration, parse_duration};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => format_duration(*d).serialize(serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt: Option<String> = Option::deserialize(deserializer)?;
            opt.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }

    /// Parse a duration string like "50ms", "5s", "1m30s"
    ///
    /// A bare number is taken as seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err("Empty duration".to_string());
        }

        let mut total = Duration::ZERO;
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            let mut num = String::new();
            while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                num.push(c);
                chars.next();
            }
            let mut unit = String::new();
            while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_alphabetic()) {
                unit.push(c);
                chars.next();
            }

            if num.is_empty() {
                return Err(format!("Invalid duration format: {}", s));
            }
            let value: u64 = num
                .parse()
                .map_err(|_| format!("Invalid number in duration: {}", num))?;

            total += match unit.as_str() {
                "h" => Duration::from_secs(value * 3600),
                "m" => Duration::from_secs(value * 60),
                "s" | "" => Duration::from_secs(value),
                "ms" => Duration::from_millis(value),
                other => return Err(format!("Invalid duration unit: {}", other)),
            };
        }

        Ok(total)
    }

    pub fn format_duration(d: Duration) -> String {
        if d.subsec_millis() != 0 || (d.as_secs() == 0 && d.as_millis() > 0) {
            return format!("{}ms", d.as_millis());
        }

        let secs = d.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        let mut result = String::new();
        if hours > 0 {
            result.push_str(&format!("{}h", hours));
        }
        if mins > 0 {
            result.push_str(&format!("{}m", mins));
        }
        if secs > 0 || result.is_empty() {
            result.push_str(&format!("{}s", secs));
        }
        result
    }
}

impl MeteoConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/ypmeteo/meteo.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let config: MeteoConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("ypmeteo").join("meteo.toml")
        } else {
            PathBuf::from(".config/ypmeteo/meteo.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        let driver = &self.driver;
        for (name, value) in [
            ("read_timeout", driver.read_timeout),
            ("flush_timeout", driver.flush_timeout),
            ("write_timeout", driver.write_timeout),
        ] {
            // libusb treats a zero timeout as "wait forever"
            if value.is_zero() {
                return Err(anyhow!("driver.{} must be greater than 0", name));
            }
        }

        if driver.max_flush_reads == 0 {
            return Err(anyhow!("driver.max_flush_reads must be at least 1"));
        }

        if self.startup.poll_interval.is_zero() {
            return Err(anyhow!("startup.poll_interval must be greater than 0"));
        }

        if self.output.interval.is_zero() {
            return Err(anyhow!("output.interval must be greater than 0"));
        }

        Ok(())
    }
}

/// Load configuration from a path that may start with `~`
pub fn load_config(path: &str) -> Result<MeteoConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    MeteoConfig::load(Some(path_buf))
}
