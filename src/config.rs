use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AutoShutdownConfig {
    pub schedule: ScheduleConfig,
    pub voting: VotingConfig,
    pub watchdog: WatchdogConfig,
    pub messages: MessagesConfig,
}

/// Daily or uptime based shutdown. All wall-clock times are 24 hour format,
/// relative to the machine's local time unless `timezone` is set.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Enable the scheduled shutdown
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,

    /// Broadcast a warning each minute for the last five minutes
    #[serde(default = "default_schedule_warnings")]
    pub warnings: bool,

    /// Postpone the shutdown while real players are online
    #[serde(default = "default_schedule_delay")]
    pub delay: bool,

    /// Treat hour/minute as an offset from startup instead of a time of day
    #[serde(default = "default_schedule_uptime")]
    pub uptime: bool,

    /// Hour of day, or hours of uptime when `uptime` is set
    #[serde(default = "default_schedule_hour")]
    pub hour: u32,

    /// Minute of the hour, or extra minutes of uptime
    #[serde(default = "default_schedule_minute")]
    pub minute: u32,

    /// Minutes to postpone by each time players are found online
    #[serde(default = "default_schedule_delay_by")]
    pub delay_by: u32,

    /// IANA timezone for wall-clock schedules (e.g. "Europe/Berlin")
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Lets players shut the server down without admin intervention
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VotingConfig {
    #[serde(default = "default_voting_enabled")]
    pub enabled: bool,

    /// Minutes to wait after a failed vote before another may start
    #[serde(default = "default_voting_interval_minutes")]
    pub interval_minutes: u32,

    /// Minimum players online to start or keep a vote
    #[serde(default = "default_voting_min_voters")]
    pub min_voters: u32,

    /// Number of "no" votes that cancels a vote
    #[serde(default = "default_voting_max_no_votes")]
    pub max_no_votes: u32,
}

/// Kills the server if it stops ticking or runs too slowly for too long.
/// A kill may corrupt data if it lands before or during a save.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchdogConfig {
    #[serde(default = "default_watchdog_enabled")]
    pub enabled: bool,

    /// Ask the host to halt before falling back to a hard kill
    #[serde(default = "default_watchdog_attempt_soft_kill")]
    pub attempt_soft_kill: bool,

    /// Seconds between checks
    #[serde(default = "default_watchdog_interval_seconds")]
    pub interval_seconds: u32,

    /// Seconds a single tick may hang before the server is killed
    #[serde(default = "default_watchdog_timeout_seconds")]
    pub timeout_seconds: u32,

    /// TPS below which the server counts as lagging
    #[serde(default = "default_watchdog_low_tps_threshold")]
    pub low_tps_threshold: u32,

    /// Seconds of sustained low TPS before the server is killed
    #[serde(default = "default_watchdog_low_tps_timeout_seconds")]
    pub low_tps_timeout_seconds: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MessagesConfig {
    /// Warning template; `%m` is replaced by the minutes left
    #[serde(default = "default_message_warn")]
    pub warn: String,

    /// Disconnect message for the scheduled shutdown
    #[serde(default = "default_message_kick")]
    pub kick: String,
}

impl AutoShutdownConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("autoshutdown.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("schedule.enabled", default_schedule_enabled())?
            .set_default("schedule.warnings", default_schedule_warnings())?
            .set_default("schedule.delay", default_schedule_delay())?
            .set_default("schedule.uptime", default_schedule_uptime())?
            .set_default("schedule.hour", default_schedule_hour() as i64)?
            .set_default("schedule.minute", default_schedule_minute() as i64)?
            .set_default("schedule.delay_by", default_schedule_delay_by() as i64)?
            .set_default("voting.enabled", default_voting_enabled())?
            .set_default(
                "voting.interval_minutes",
                default_voting_interval_minutes() as i64,
            )?
            .set_default("voting.min_voters", default_voting_min_voters() as i64)?
            .set_default("voting.max_no_votes", default_voting_max_no_votes() as i64)?
            .set_default("watchdog.enabled", default_watchdog_enabled())?
            .set_default(
                "watchdog.attempt_soft_kill",
                default_watchdog_attempt_soft_kill(),
            )?
            .set_default(
                "watchdog.interval_seconds",
                default_watchdog_interval_seconds() as i64,
            )?
            .set_default(
                "watchdog.timeout_seconds",
                default_watchdog_timeout_seconds() as i64,
            )?
            .set_default(
                "watchdog.low_tps_threshold",
                default_watchdog_low_tps_threshold() as i64,
            )?
            .set_default(
                "watchdog.low_tps_timeout_seconds",
                default_watchdog_low_tps_timeout_seconds() as i64,
            )?
            .set_default("messages.warn", default_message_warn())?
            .set_default("messages.kick", default_message_kick())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // e.g. AUTOSHUTDOWN_SCHEDULE__HOUR=4
            .add_source(
                Environment::with_prefix("AUTOSHUTDOWN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AutoShutdownConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Strict check used by `--validate-config`; reports the first problem
    /// instead of correcting it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value, min, max) in self.ranged_values() {
            if value < min || value > max {
                return Err(ConfigError::Message(format!(
                    "{} must be between {} and {} (got {})",
                    key, min, max, value
                )));
            }
        }

        if !self.schedule.uptime && self.schedule.hour >= 24 {
            return Err(ConfigError::Message(
                "schedule.hour must be below 24 unless schedule.uptime is enabled".to_string(),
            ));
        }

        if self.schedule.uptime && self.schedule.hour == 0 && self.schedule.minute == 0 {
            return Err(ConfigError::Message(
                "Uptime shutdown cannot be after 0 hours and 0 minutes".to_string(),
            ));
        }

        if let Some(name) = &self.schedule.timezone {
            if name.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!(
                    "Unknown schedule.timezone '{}'",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Corrects inconsistent values in place, logging a warning for each
    /// correction. Returns the keys that were changed. Running it twice
    /// changes nothing the second time.
    pub fn normalize(&mut self) -> Vec<&'static str> {
        let mut corrected = Vec::new();

        let defaults = Self::default();
        for (key, value, min, max) in self.ranged_values() {
            if value < min || value > max {
                corrected.push(key);
            }
        }
        for key in &corrected {
            let fallback = defaults.ranged_value(key);
            warn!(
                "{} is out of range! Please fix this in the config. It will be set to {}.",
                key, fallback
            );
            self.set_ranged_value(key, fallback);
        }

        if !self.schedule.uptime && self.schedule.hour >= 24 {
            warn!(
                "Uptime shutdown is disabled, but the shutdown hour is more than 23! \
                 Please fix this in the config. It will be set to 00 hours."
            );
            self.schedule.hour = 0;
            corrected.push("schedule.hour");
        }

        if self.schedule.uptime && self.schedule.hour == 0 && self.schedule.minute == 0 {
            warn!(
                "Uptime shutdown is enabled, but is set to shutdown after 0 hours and \
                 0 minutes of uptime! Please fix this in the config. It will be set to 24 hours."
            );
            self.schedule.hour = 24;
            corrected.push("schedule.hour");
        }

        if let Some(name) = &self.schedule.timezone {
            if name.parse::<chrono_tz::Tz>().is_err() {
                warn!(
                    "Unknown schedule timezone '{}', falling back to local time",
                    name
                );
                self.schedule.timezone = None;
                corrected.push("schedule.timezone");
            }
        }

        corrected
    }

    pub fn is_nothing_enabled(&self) -> bool {
        !self.schedule.enabled && !self.voting.enabled && !self.watchdog.enabled
    }

    /// Render as TOML, used by `--print-config`
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn ranged_values(&self) -> [(&'static str, u32, u32, u32); 10] {
        [
            ("schedule.hour", self.schedule.hour, 0, 720),
            ("schedule.minute", self.schedule.minute, 0, 59),
            ("schedule.delay_by", self.schedule.delay_by, 1, 1440),
            ("voting.interval_minutes", self.voting.interval_minutes, 0, 1440),
            ("voting.min_voters", self.voting.min_voters, 1, 999),
            ("voting.max_no_votes", self.voting.max_no_votes, 1, 999),
            ("watchdog.interval_seconds", self.watchdog.interval_seconds, 1, 3600),
            ("watchdog.timeout_seconds", self.watchdog.timeout_seconds, 1, 3600),
            ("watchdog.low_tps_threshold", self.watchdog.low_tps_threshold, 0, 19),
            (
                "watchdog.low_tps_timeout_seconds",
                self.watchdog.low_tps_timeout_seconds,
                1,
                3600,
            ),
        ]
    }

    fn ranged_value(&self, key: &str) -> u32 {
        self.ranged_values()
            .iter()
            .find(|(name, ..)| *name == key)
            .map(|(_, value, ..)| *value)
            .unwrap_or_default()
    }

    fn set_ranged_value(&mut self, key: &str, value: u32) {
        let slot = match key {
            "schedule.hour" => &mut self.schedule.hour,
            "schedule.minute" => &mut self.schedule.minute,
            "schedule.delay_by" => &mut self.schedule.delay_by,
            "voting.interval_minutes" => &mut self.voting.interval_minutes,
            "voting.min_voters" => &mut self.voting.min_voters,
            "voting.max_no_votes" => &mut self.voting.max_no_votes,
            "watchdog.interval_seconds" => &mut self.watchdog.interval_seconds,
            "watchdog.timeout_seconds" => &mut self.watchdog.timeout_seconds,
            "watchdog.low_tps_threshold" => &mut self.watchdog.low_tps_threshold,
            "watchdog.low_tps_timeout_seconds" => &mut self.watchdog.low_tps_timeout_seconds,
            _ => return,
        };
        *slot = value;
    }
}

impl Default for AutoShutdownConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig {
                enabled: default_schedule_enabled(),
                warnings: default_schedule_warnings(),
                delay: default_schedule_delay(),
                uptime: default_schedule_uptime(),
                hour: default_schedule_hour(),
                minute: default_schedule_minute(),
                delay_by: default_schedule_delay_by(),
                timezone: None,
            },
            voting: VotingConfig {
                enabled: default_voting_enabled(),
                interval_minutes: default_voting_interval_minutes(),
                min_voters: default_voting_min_voters(),
                max_no_votes: default_voting_max_no_votes(),
            },
            watchdog: WatchdogConfig {
                enabled: default_watchdog_enabled(),
                attempt_soft_kill: default_watchdog_attempt_soft_kill(),
                interval_seconds: default_watchdog_interval_seconds(),
                timeout_seconds: default_watchdog_timeout_seconds(),
                low_tps_threshold: default_watchdog_low_tps_threshold(),
                low_tps_timeout_seconds: default_watchdog_low_tps_timeout_seconds(),
            },
            messages: MessagesConfig {
                warn: default_message_warn(),
                kick: default_message_kick(),
            },
        }
    }
}

// Default value functions
fn default_schedule_enabled() -> bool {
    true
}
fn default_schedule_warnings() -> bool {
    true
}
fn default_schedule_delay() -> bool {
    false
}
fn default_schedule_uptime() -> bool {
    false
}
fn default_schedule_hour() -> u32 {
    5
}
fn default_schedule_minute() -> u32 {
    0
}
fn default_schedule_delay_by() -> u32 {
    5
}

fn default_voting_enabled() -> bool {
    false
}
fn default_voting_interval_minutes() -> u32 {
    15
}
fn default_voting_min_voters() -> u32 {
    4
}
fn default_voting_max_no_votes() -> u32 {
    2
}

fn default_watchdog_enabled() -> bool {
    false
}
fn default_watchdog_attempt_soft_kill() -> bool {
    true
}
fn default_watchdog_interval_seconds() -> u32 {
    10
}
fn default_watchdog_timeout_seconds() -> u32 {
    40
}
fn default_watchdog_low_tps_threshold() -> u32 {
    10
}
fn default_watchdog_low_tps_timeout_seconds() -> u32 {
    30
}

fn default_message_warn() -> String {
    "Server is shutting down in %m minute(s).".to_string()
}
fn default_message_kick() -> String {
    "Scheduled server shutdown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    /// Loading reads the process environment; tests that load or set
    /// variables take this lock
    static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

    #[test]
    fn test_default_config() {
        let config = AutoShutdownConfig::default();

        assert!(config.validate().is_ok());
        assert!(config.schedule.enabled);
        assert!(!config.voting.enabled);
        assert!(!config.watchdog.enabled);
        assert!(!config.is_nothing_enabled());
    }

    #[test]
    fn test_hour_above_23_without_uptime_is_reset() {
        let mut config = AutoShutdownConfig::default();
        config.schedule.uptime = false;
        config.schedule.hour = 48;

        assert!(config.validate().is_err());

        let corrected = config.normalize();
        assert_eq!(corrected, vec!["schedule.hour"]);
        assert_eq!(config.schedule.hour, 0);

        // Second pass is a no-op
        assert!(config.normalize().is_empty());
        assert_eq!(config.schedule.hour, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_uptime_becomes_a_day() {
        let mut config = AutoShutdownConfig::default();
        config.schedule.uptime = true;
        config.schedule.hour = 0;
        config.schedule.minute = 0;

        config.normalize();
        assert_eq!(config.schedule.hour, 24);
        assert!(config.normalize().is_empty());
    }

    #[test]
    fn test_uptime_allows_large_hours() {
        let mut config = AutoShutdownConfig::default();
        config.schedule.uptime = true;
        config.schedule.hour = 72;

        assert!(config.validate().is_ok());
        assert!(config.normalize().is_empty());
        assert_eq!(config.schedule.hour, 72);
    }

    #[test]
    fn test_out_of_range_values_fall_back_to_defaults() {
        let mut config = AutoShutdownConfig::default();
        config.watchdog.low_tps_threshold = 25;
        config.voting.min_voters = 0;
        config.schedule.minute = 75;

        let corrected = config.normalize();
        assert!(corrected.contains(&"watchdog.low_tps_threshold"));
        assert!(corrected.contains(&"voting.min_voters"));
        assert!(corrected.contains(&"schedule.minute"));
        assert_eq!(config.watchdog.low_tps_threshold, 10);
        assert_eq!(config.voting.min_voters, 4);
        assert_eq!(config.schedule.minute, 0);
    }

    #[test]
    fn test_invalid_timezone_is_dropped() {
        let mut config = AutoShutdownConfig::default();
        config.schedule.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(config.validate().is_err());

        config.normalize();
        assert_eq!(config.schedule.timezone, None);

        config.schedule.timezone = Some("Europe/Berlin".to_string());
        assert!(config.normalize().is_empty());
    }

    #[test]
    fn test_nothing_enabled() {
        let mut config = AutoShutdownConfig::default();
        config.schedule.enabled = false;
        assert!(config.is_nothing_enabled());

        config.watchdog.enabled = true;
        assert!(!config.is_nothing_enabled());
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[schedule]
hour = 3
minute = 30
delay = true

[voting]
enabled = true
min_voters = 2

[messages]
kick = "Nightly restart"
"#
        )
        .unwrap();

        let config = AutoShutdownConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.schedule.hour, 3);
        assert_eq!(config.schedule.minute, 30);
        assert!(config.schedule.delay);
        assert!(config.voting.enabled);
        assert_eq!(config.voting.min_voters, 2);
        assert_eq!(config.voting.max_no_votes, 2);
        assert_eq!(config.messages.kick, "Nightly restart");
        assert_eq!(config.messages.warn, default_message_warn());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let _env = ENV_LOCK.lock();
        let dir = tempfile::tempdir().unwrap();
        let config = AutoShutdownConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AutoShutdownConfig::default());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("AUTOSHUTDOWN_SCHEDULE__DELAY_BY", "17");
        std::env::set_var("AUTOSHUTDOWN_VOTING__ENABLED", "true");

        let dir = tempfile::tempdir().unwrap();
        let loaded = AutoShutdownConfig::load_from_file(dir.path().join("absent.toml"));

        std::env::remove_var("AUTOSHUTDOWN_SCHEDULE__DELAY_BY");
        std::env::remove_var("AUTOSHUTDOWN_VOTING__ENABLED");

        let config = loaded.unwrap();
        assert_eq!(config.schedule.delay_by, 17);
        assert!(config.voting.enabled);
        assert_eq!(config.schedule.hour, default_schedule_hour());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let rendered = AutoShutdownConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[schedule]"));
        assert!(rendered.contains("[watchdog]"));

        let parsed: AutoShutdownConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, AutoShutdownConfig::default());
    }
}
