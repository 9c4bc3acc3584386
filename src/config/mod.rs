//! Configuration file management
//!
//! Loads TOML configuration files and provides daemon settings (spec §6's configuration table).
//! Default config path: `/etc/seatwarden/seatwarden.toml`, overridable via `$SEATWARDEN_CONFIG`.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(target_os = "linux")]
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
#[cfg(target_os = "linux")]
use std::path::Path;
#[cfg(target_os = "linux")]
use std::sync::mpsc;

/// Action taken when a key/switch/idle timeout fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerAction {
    Ignore,
    PowerOff,
    Reboot,
    Halt,
    Suspend,
    Hibernate,
    HybridSleep,
    Lock,
}

impl Default for PowerAction {
    fn default() -> Self {
        PowerAction::Ignore
    }
}

/// Top-level daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kill: KillConfig,
    pub inhibit: InhibitConfig,
    pub handlers: HandlerConfig,
    pub idle: IdleConfig,
    pub holdoff: HoldoffConfig,
    pub power_states: PowerStatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            kill: KillConfig::default(),
            inhibit: InhibitConfig::default(),
            handlers: HandlerConfig::default(),
            idle: IdleConfig::default(),
            holdoff: HoldoffConfig::default(),
            power_states: PowerStatesConfig::default(),
        }
    }
}

/// Logout-time process kill policy (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KillConfig {
    /// Master switch for logout-time kill.
    pub kill_user_processes: bool,
    /// If non-empty, the only users whose processes are killed.
    pub kill_only_users: Vec<String>,
    /// Always exempt, regardless of `kill_only_users`.
    pub kill_exclude_users: Vec<String>,
}

impl Default for KillConfig {
    fn default() -> Self {
        KillConfig {
            kill_user_processes: false,
            kill_only_users: Vec::new(),
            kill_exclude_users: vec!["root".to_string()],
        }
    }
}

/// Delay-inhibitor timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InhibitConfig {
    /// Maximum time a delay inhibitor can hold off a power operation.
    pub inhibit_delay_max_sec: u64,
}

impl Default for InhibitConfig {
    fn default() -> Self {
        InhibitConfig {
            inhibit_delay_max_sec: 5,
        }
    }
}

/// What each physical control does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub handle_power_key: PowerAction,
    pub handle_suspend_key: PowerAction,
    pub handle_hibernate_key: PowerAction,
    pub handle_lid_switch: PowerAction,
    /// Lid action when `is_docked_or_multiple_displays()` is true (spec §4.6).
    pub handle_lid_switch_docked: PowerAction,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            handle_power_key: PowerAction::PowerOff,
            handle_suspend_key: PowerAction::Suspend,
            handle_hibernate_key: PowerAction::Hibernate,
            handle_lid_switch: PowerAction::Suspend,
            handle_lid_switch_docked: PowerAction::Ignore,
        }
    }
}

/// Idle-timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub idle_action: PowerAction,
    pub idle_action_sec: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        IdleConfig {
            idle_action: PowerAction::Ignore,
            idle_action_sec: 30 * 60,
        }
    }
}

/// Grace period after a power/lid/suspend action before the next one is honored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldoffConfig {
    pub holdoff_timeout_sec: u64,
}

impl Default for HoldoffConfig {
    fn default() -> Self {
        HoldoffConfig {
            holdoff_timeout_sec: 30,
        }
    }
}

/// Strings written to `/sys/power/state` and `/sys/power/disk` by the (out-of-scope) sleep
/// executor; the core only selects among these, it never performs the write itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerStatesConfig {
    pub suspend_state: String,
    pub suspend_mode: String,
    pub hibernate_state: String,
    pub hibernate_mode: String,
    pub hybrid_sleep_state: String,
    pub hybrid_sleep_mode: String,
}

impl Default for PowerStatesConfig {
    fn default() -> Self {
        PowerStatesConfig {
            suspend_state: "mem standby freeze".to_string(),
            suspend_mode: String::new(),
            hibernate_state: "disk".to_string(),
            hibernate_mode: "platform shutdown".to_string(),
            hybrid_sleep_state: "disk".to_string(),
            hybrid_sleep_mode: "suspend platform shutdown".to_string(),
        }
    }
}

impl Config {
    /// System-wide config path.
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/seatwarden/seatwarden.toml";

    /// Path that would be used for loading config, or `None` if falling back to built-in
    /// defaults.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SEATWARDEN_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Some(p);
            }
        }

        let system_config = PathBuf::from(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with priority: `$SEATWARDEN_CONFIG` env var, then
    /// `/etc/seatwarden/seatwarden.toml`, then built-in defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("failed to load config {}: {e:#}", path.display());
                }
            }
        }
        info!("using built-in default config");
        Self::default()
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// Config file change watcher (Linux only), used to hot-reload without a daemon restart.
#[cfg(target_os = "linux")]
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

#[cfg(target_os = "linux")]
impl ConfigWatcher {
    pub fn new(config_path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                use notify::EventKind;
                match event.kind {
                    EventKind::Modify(_) | EventKind::Create(_) => {
                        let _ = tx.send(());
                    }
                    _ => {}
                }
            }
        })?;

        let watch_path = config_path.parent().unwrap_or(config_path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking check for a pending reload.
    pub fn check_reload(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let cfg = Config::default();
        assert!(!cfg.kill.kill_user_processes);
        assert_eq!(cfg.inhibit.inhibit_delay_max_sec, 5);
        assert_eq!(cfg.handlers.handle_lid_switch, PowerAction::Suspend);
        assert_eq!(cfg.handlers.handle_lid_switch_docked, PowerAction::Ignore);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let serialized = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.kill.kill_exclude_users, cfg.kill.kill_exclude_users);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let toml_str = r#"
            unknown_top_level = true

            [kill]
            kill_user_processes = true
            unknown_field = 42
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert!(cfg.kill.kill_user_processes);
    }
}
