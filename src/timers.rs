use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};

/// Which inactivity deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerExpiry {
    Screensaver,
    Poweroff,
}

/// The two one-shot inactivity timers owned by the screen controller.
///
/// Each purpose holds at most one pending deadline. Arming replaces the
/// previous slot outright, so a superseded deadline can never fire; cancel
/// is an idempotent no-op on an empty slot. A slot is cleared when its
/// deadline is reported through [`Timers::expired`].
#[derive(Debug, Default)]
pub struct Timers {
    screensaver: Option<Pin<Box<Sleep>>>,
    poweroff: Option<Pin<Box<Sleep>>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_screensaver(&mut self, delay: Duration) {
        self.screensaver = Some(Box::pin(sleep(delay)));
    }

    pub fn arm_poweroff(&mut self, delay: Duration) {
        self.poweroff = Some(Box::pin(sleep(delay)));
    }

    pub fn cancel_screensaver(&mut self) {
        self.screensaver = None;
    }

    pub fn cancel_poweroff(&mut self) {
        self.poweroff = None;
    }

    pub fn cancel_all(&mut self) {
        self.screensaver = None;
        self.poweroff = None;
    }

    /// Resolves with the purpose of the next deadline to elapse, clearing
    /// that slot. Pends forever while neither timer is armed, so this can
    /// sit as one branch of a `select!` loop.
    pub async fn expired(&mut self) -> TimerExpiry {
        let which = {
            let screensaver = wait(&mut self.screensaver);
            let poweroff = wait(&mut self.poweroff);
            tokio::select! {
                () = screensaver => TimerExpiry::Screensaver,
                () = poweroff => TimerExpiry::Poweroff,
            }
        };
        match which {
            TimerExpiry::Screensaver => self.screensaver = None,
            TimerExpiry::Poweroff => self.poweroff = None,
        }
        which
    }
}

async fn wait(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(deadline) => deadline.as_mut().await,
        None => pending().await,
    }
}
