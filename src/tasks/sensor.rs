use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use evdev::{Device, EventSummary, KeyCode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SensorOptions;
use crate::events::ScreenSignal;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SensorTaskError {
    #[error("unknown key code: {0}")]
    UnknownKey(String),
}

/// Watches the PIR sensor's input device and reports every key-down as
/// motion.
///
/// The GPIO itself belongs to the kernel gpio-keys overlay; this task only
/// reads the event device it exposes. Opening retries with capped backoff
/// (the device may enumerate late at boot), but a read error on the open
/// stream is fatal: a broken sensor binding cannot be recovered here, so it
/// is surfaced instead of being silently swallowed.
pub async fn run(
    cfg: SensorOptions,
    signals: mpsc::Sender<ScreenSignal>,
    cancel: CancellationToken,
) -> Result<()> {
    if !cfg.enabled {
        info!("motion sensor disabled via configuration");
        return Ok(());
    }

    let target_key = parse_key(&cfg.key_code)?;

    let open_fut = open_sensor_device(&cfg, target_key);
    tokio::pin!(open_fut);

    let device = tokio::select! {
        result = &mut open_fut => result.context("open motion sensor input device")?,
        _ = cancel.cancelled() => {
            info!("shutdown requested before the motion sensor device was ready");
            return Ok(());
        }
    };

    let mut stream = device.into_event_stream().context("event stream")?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next_event() => {
                let event = event.context("read motion sensor event")?;
                if let EventSummary::Key(_, key, 1) = event.destructure() {
                    if key == target_key {
                        debug!("motion detected");
                        if signals.send(ScreenSignal::Motion).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    info!("motion sensor task stopped");
    Ok(())
}

fn parse_key(code: &str) -> Result<KeyCode> {
    KeyCode::from_str(code).map_err(|_| SensorTaskError::UnknownKey(code.to_string()).into())
}

async fn open_sensor_device(cfg: &SensorOptions, target_key: KeyCode) -> Result<Device> {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match try_open_device(cfg, target_key) {
            Ok(device) => return Ok(device),
            Err(err) => {
                warn!(
                    "motion sensor input device unavailable: {err:?}; retrying in {}s",
                    delay.as_secs()
                );
                time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
}

fn try_open_device(cfg: &SensorOptions, target_key: KeyCode) -> Result<Device> {
    if let Some(path) = cfg.device_path.as_ref() {
        return Device::open(path).with_context(|| format!("open {}", path.display()));
    }

    for (path, device) in evdev::enumerate() {
        if device_matches(&device, target_key) {
            info!("using input device {}", path.display());
            return Device::open(&path).with_context(|| format!("open {}", path.display()));
        }
    }

    Err(anyhow!("no compatible motion sensor input device found"))
}

fn device_matches(device: &Device, target_key: KeyCode) -> bool {
    let name = device.name().unwrap_or("").to_ascii_lowercase();

    if !name_matches(&name) {
        return false;
    }

    device
        .supported_keys()
        .map(|keys| keys.contains(target_key))
        .unwrap_or(false)
}

fn name_matches(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return false;
    }

    trimmed.contains("pir")
        || trimmed.contains("motion")
        || (trimmed.contains("gpio") && trimmed.contains("key"))
}
