use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Activity state of the attached display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    Off,
    Screensaver,
    On,
}

impl ScreenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Screensaver => "SCREENSAVER",
            Self::On => "ON",
        }
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown screen state: {0}")]
pub struct UnknownScreenState(pub String);

impl FromStr for ScreenState {
    type Err = UnknownScreenState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFF" => Ok(Self::Off),
            "SCREENSAVER" => Ok(Self::Screensaver),
            "ON" => Ok(Self::On),
            other => Err(UnknownScreenState(other.to_string())),
        }
    }
}

/// Inbound event for the screen controller.
#[derive(Debug, Clone)]
pub enum ScreenSignal {
    /// The PIR sensor saw movement.
    Motion,
    /// An external client asked for an explicit state. The raw string is
    /// carried so the controller owns validation and its warn-and-ignore
    /// policy for unrecognized values.
    SetState(String),
}

/// Fire-and-forget instruction to the effect dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCommand {
    PowerOn,
    PowerOff,
    ScreensaverOn,
    ScreensaverOff,
}
