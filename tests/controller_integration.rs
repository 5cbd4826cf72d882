//! End-to-end scenarios for the screen controller task, driven on a paused
//! clock so the inactivity cascade (60s screensaver, 300s poweroff with the
//! default configuration) runs instantly and deterministically.

use std::time::Duration;

use pir_screend::config::Configuration;
use pir_screend::events::{EffectCommand, ScreenSignal, ScreenState};
use pir_screend::tasks::controller::{self, ScreenController};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Harness {
    signals: mpsc::Sender<ScreenSignal>,
    effects: mpsc::UnboundedReceiver<EffectCommand>,
    states: broadcast::Receiver<ScreenState>,
    cancel: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

fn spawn_controller() -> Harness {
    let cfg = Configuration::default();
    let (signals, signal_rx) = mpsc::channel(16);
    let (effect_tx, effects) = mpsc::unbounded_channel();
    let (state_tx, states) = broadcast::channel(16);
    let cancel = CancellationToken::new();

    let screen = ScreenController::new(&cfg, effect_tx, state_tx);
    let task = tokio::spawn(controller::run(screen, signal_rx, cancel.clone()));

    Harness {
        signals,
        effects,
        states,
        cancel,
        task,
    }
}

impl Harness {
    async fn next_effect(&mut self) -> EffectCommand {
        timeout(Duration::from_secs(3600), self.effects.recv())
            .await
            .expect("timed out waiting for effect")
            .expect("effect channel closed")
    }

    async fn next_state(&mut self) -> ScreenState {
        timeout(Duration::from_secs(3600), self.states.recv())
            .await
            .expect("timed out waiting for state change")
            .expect("state channel closed")
    }

    /// Consume the forced startup transition: screensaver off, power on,
    /// broadcast ON.
    async fn drain_startup(&mut self) {
        assert_eq!(self.next_effect().await, EffectCommand::ScreensaverOff);
        assert_eq!(self.next_effect().await, EffectCommand::PowerOn);
        assert_eq!(self.next_state().await, ScreenState::On);
    }

    async fn assert_quiet(&mut self, window: Duration) {
        let effect = timeout(window, self.effects.recv()).await;
        assert!(effect.is_err(), "unexpected effect: {effect:?}");
        let state = timeout(window, self.states.recv()).await;
        assert!(state.is_err(), "unexpected state change: {state:?}");
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn startup_forces_power_on_and_broadcasts() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn inactivity_cascades_through_screensaver_to_off() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    let start = tokio::time::Instant::now();

    // Screensaver delay elapses first.
    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOn);
    assert_eq!(harness.next_state().await, ScreenState::Screensaver);
    assert_eq!(start.elapsed().as_secs(), 60);

    // The poweroff timer was never reset by the screensaver midpoint.
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);
    assert_eq!(start.elapsed().as_secs(), 300);

    // Off is terminal: nothing more happens without a wake request.
    harness.assert_quiet(Duration::from_secs(3600)).await;
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn motion_resets_both_deadlines_without_power_on() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    tokio::time::advance(Duration::from_secs(30)).await;
    harness.signals.send(ScreenSignal::Motion).await.unwrap();

    // Already on: screensaver is dropped but no power-on command goes out.
    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOff);
    assert_eq!(harness.next_state().await, ScreenState::On);

    // New screensaver deadline is 60s after the motion, not after startup.
    let motion_at = tokio::time::Instant::now();
    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOn);
    assert_eq!(harness.next_state().await, ScreenState::Screensaver);
    assert_eq!(motion_at.elapsed().as_secs(), 60);

    // Poweroff lands 300s after the motion.
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);
    assert_eq!(motion_at.elapsed().as_secs(), 300);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_off_from_screensaver_cancels_the_poweroff_timer() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOn);
    assert_eq!(harness.next_state().await, ScreenState::Screensaver);

    harness
        .signals
        .send(ScreenSignal::SetState("OFF".into()))
        .await
        .unwrap();
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);

    // The poweroff deadline at t=300 was cancelled; nothing fires again.
    harness.assert_quiet(Duration::from_secs(3600)).await;
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn bogus_set_state_is_ignored_and_timers_keep_running() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    harness
        .signals
        .send(ScreenSignal::SetState("BOGUS".into()))
        .await
        .unwrap();

    // No effect and no broadcast inside the screensaver window...
    harness.assert_quiet(Duration::from_secs(20)).await;

    // ...and the original deadline still fires on schedule.
    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOn);
    assert_eq!(harness.next_state().await, ScreenState::Screensaver);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn off_stays_quiet_when_the_screensaver_deadline_passes() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    // Power off early; request_off leaves the screensaver timer armed.
    tokio::time::advance(Duration::from_secs(10)).await;
    harness
        .signals
        .send(ScreenSignal::SetState("OFF".into()))
        .await
        .unwrap();
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);

    // Its expiry at t=60 must not wake the screensaver while off.
    harness.assert_quiet(Duration::from_secs(3600)).await;
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wake_from_off_issues_power_on() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    harness
        .signals
        .send(ScreenSignal::SetState("OFF".into()))
        .await
        .unwrap();
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);

    harness.signals.send(ScreenSignal::Motion).await.unwrap();
    assert_eq!(harness.next_effect().await, EffectCommand::ScreensaverOff);
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOn);
    assert_eq!(harness.next_state().await, ScreenState::On);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn redundant_off_request_is_a_no_op() {
    let mut harness = spawn_controller();
    harness.drain_startup().await;

    harness
        .signals
        .send(ScreenSignal::SetState("OFF".into()))
        .await
        .unwrap();
    assert_eq!(harness.next_effect().await, EffectCommand::PowerOff);
    assert_eq!(harness.next_state().await, ScreenState::Off);

    harness
        .signals
        .send(ScreenSignal::SetState("OFF".into()))
        .await
        .unwrap();
    harness.assert_quiet(Duration::from_secs(3600)).await;

    harness.shutdown().await;
}
