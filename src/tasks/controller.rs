use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::events::{EffectCommand, ScreenSignal, ScreenState};
use crate::timers::{TimerExpiry, Timers};

/// Owns the screen state and both inactivity timers.
///
/// Every mutation happens on the single task driving [`run`], so the state
/// machine needs no locking: one event is handled to completion (including
/// timer re-arming and the broadcast) before the next is looked at.
pub struct ScreenController {
    state: ScreenState,
    timers: Timers,
    screensaver_delay: Duration,
    poweroff_delay: Duration,
    effects: mpsc::UnboundedSender<EffectCommand>,
    state_changes: broadcast::Sender<ScreenState>,
}

impl ScreenController {
    pub fn new(
        config: &Configuration,
        effects: mpsc::UnboundedSender<EffectCommand>,
        state_changes: broadcast::Sender<ScreenState>,
    ) -> Self {
        Self {
            state: ScreenState::On,
            timers: Timers::new(),
            screensaver_delay: config.screensaver_delay,
            poweroff_delay: config.poweroff_delay,
            effects,
            state_changes,
        }
    }

    pub fn current(&self) -> ScreenState {
        self.state
    }

    /// Wake the display. With `force` the power-on command is sent even when
    /// the in-memory state already reads On; used once at startup, where the
    /// panel's real power state is unknown.
    pub fn request_on(&mut self, force: bool) {
        // The screensaver is dropped on any wake request, whatever the state.
        self.timers.cancel_screensaver();
        self.emit(EffectCommand::ScreensaverOff);

        if self.state == ScreenState::Off || force {
            info!("powering display on");
            self.emit(EffectCommand::PowerOn);
        }

        self.state = ScreenState::On;
        self.timers.arm_screensaver(self.screensaver_delay);
        self.timers.arm_poweroff(self.poweroff_delay);
        self.broadcast();
    }

    /// Power the display off. Off is terminal until the next wake request;
    /// no timers are left armed and a redundant call is a silent no-op.
    pub fn request_off(&mut self) {
        if self.state == ScreenState::Off {
            return;
        }

        self.timers.cancel_poweroff();
        info!("powering display off");
        self.emit(EffectCommand::PowerOff);
        self.state = ScreenState::Off;
        self.broadcast();
    }

    /// Activate the screensaver. The poweroff timer keeps running: the
    /// screensaver is a midpoint on the way to a full power-off, not a reset.
    pub fn request_screensaver(&mut self) {
        self.timers.cancel_screensaver();
        info!("activating screensaver");
        self.emit(EffectCommand::ScreensaverOn);
        self.state = ScreenState::Screensaver;
        self.broadcast();
    }

    /// Handle an explicit state request. Unrecognized values are logged and
    /// otherwise ignored: no state change, no effects, no broadcast.
    pub fn set_state(&mut self, target: &str) {
        match target.parse() {
            Ok(ScreenState::Off) => self.request_off(),
            Ok(ScreenState::Screensaver) => self.request_screensaver(),
            Ok(ScreenState::On) => self.request_on(false),
            Err(err) => warn!(%err, "ignoring screen state request"),
        }
    }

    fn handle_expiry(&mut self, expiry: TimerExpiry) {
        match expiry {
            TimerExpiry::Screensaver => {
                // request_off leaves the screensaver timer armed, so its
                // expiry can arrive while already Off; nothing to save then.
                if self.state == ScreenState::Off {
                    debug!("screensaver timeout while display is off; ignoring");
                    return;
                }
                debug!("screensaver timeout");
                self.request_screensaver();
            }
            TimerExpiry::Poweroff => {
                debug!("poweroff timeout");
                self.request_off();
            }
        }
    }

    fn emit(&self, command: EffectCommand) {
        if self.effects.send(command).is_err() {
            warn!(?command, "effect dispatcher is gone; dropping command");
        }
    }

    fn broadcast(&self) {
        debug!(state = %self.state, "screen state changed");
        // Err only means nobody is subscribed right now.
        let _ = self.state_changes.send(self.state);
    }

    async fn timers_expired(&mut self) -> TimerExpiry {
        self.timers.expired().await
    }
}

enum Input {
    Expiry(TimerExpiry),
    Signal(ScreenSignal),
    Shutdown,
}

/// Drives the screen state machine: timer expiries and inbound signals are
/// funneled through one loop, one at a time, in arrival order.
pub async fn run(
    mut controller: ScreenController,
    mut signals: mpsc::Receiver<ScreenSignal>,
    cancel: CancellationToken,
) -> Result<()> {
    // Force the panel through power-on so the real device ends up in a known
    // state, whatever it was doing before we started.
    controller.request_on(true);

    loop {
        let input = tokio::select! {
            _ = cancel.cancelled() => Input::Shutdown,
            expiry = controller.timers_expired() => Input::Expiry(expiry),
            maybe_signal = signals.recv() => match maybe_signal {
                Some(signal) => Input::Signal(signal),
                None => Input::Shutdown,
            },
        };

        match input {
            Input::Expiry(expiry) => controller.handle_expiry(expiry),
            Input::Signal(ScreenSignal::Motion) => {
                debug!("motion detected");
                controller.request_on(false);
            }
            Input::Signal(ScreenSignal::SetState(target)) => controller.set_state(&target),
            Input::Shutdown => break,
        }
    }

    // Release the timers before the signal sources are torn down so no
    // pending deadline can fire into a dismantled state machine.
    controller.timers.cancel_all();
    info!("screen controller stopped");
    Ok(())
}
