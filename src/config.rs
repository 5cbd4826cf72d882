use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::events::EffectCommand;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Inactivity before the screensaver is activated.
    #[serde(with = "humantime_serde")]
    pub screensaver_delay: Duration,
    /// Inactivity before the display is powered off entirely.
    #[serde(with = "humantime_serde")]
    pub poweroff_delay: Duration,
    /// Motion sensor input binding.
    pub sensor: SensorOptions,
    /// Shell commands run for each effect.
    pub effects: EffectCommands,
    /// Unix socket for explicit set-state requests and state-change
    /// notifications. Disabled when unset.
    pub control_socket: Option<PathBuf>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.screensaver_delay.is_zero(),
            "screensaver-delay must be positive"
        );
        ensure!(
            !self.poweroff_delay.is_zero(),
            "poweroff-delay must be positive"
        );
        self.effects.validate()?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            screensaver_delay: Duration::from_secs(60),
            poweroff_delay: Duration::from_secs(300),
            sensor: SensorOptions::default(),
            effects: EffectCommands::default(),
            control_socket: None,
        }
    }
}

/// How the PIR sensor reaches the daemon. The sensor GPIO itself is wired
/// up by the kernel gpio-keys overlay; this daemon only consumes the
/// resulting input device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SensorOptions {
    pub enabled: bool,
    /// Input device path (evdev). Auto-detects when omitted.
    pub device_path: Option<PathBuf>,
    /// Key code the gpio-keys overlay reports for the sensor.
    pub key_code: String,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            device_path: None,
            key_code: "KEY_WAKEUP".to_string(),
        }
    }
}

/// Shell command mapped to each effect. An unset command disables that
/// effect (the dispatcher skips it with a debug log).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EffectCommands {
    pub power_on: Option<String>,
    pub power_off: Option<String>,
    pub screensaver_on: Option<String>,
    pub screensaver_off: Option<String>,
}

impl EffectCommands {
    pub fn command_for(&self, command: EffectCommand) -> Option<&str> {
        match command {
            EffectCommand::PowerOn => self.power_on.as_deref(),
            EffectCommand::PowerOff => self.power_off.as_deref(),
            EffectCommand::ScreensaverOn => self.screensaver_on.as_deref(),
            EffectCommand::ScreensaverOff => self.screensaver_off.as_deref(),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure_not_blank(self.power_on.as_deref(), "effects.power-on")?;
        ensure_not_blank(self.power_off.as_deref(), "effects.power-off")?;
        ensure_not_blank(self.screensaver_on.as_deref(), "effects.screensaver-on")?;
        ensure_not_blank(self.screensaver_off.as_deref(), "effects.screensaver-off")?;
        Ok(())
    }
}

impl Default for EffectCommands {
    fn default() -> Self {
        Self {
            power_on: Some("vcgencmd display_power 1".to_string()),
            power_off: Some("vcgencmd display_power 0".to_string()),
            screensaver_on: Some("xscreensaver-command -activate".to_string()),
            screensaver_off: Some("xscreensaver-command -deactivate".to_string()),
        }
    }
}

fn ensure_not_blank(value: Option<&str>, label: &str) -> Result<()> {
    if let Some(cmd) = value {
        ensure!(!cmd.trim().is_empty(), "{label} must not be blank");
    }
    Ok(())
}
