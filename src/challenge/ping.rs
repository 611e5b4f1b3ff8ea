use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::net::Channel;

use super::controller::ChallengeController;

pub const PING_INTERVAL: Duration = Duration::from_millis(2000);
pub(crate) const PING_MESSAGE: &str = "ping";

/// Liveness loop state. `Stopped` is terminal: nothing restarts the loop
/// within a page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingerStatus {
    Active,
    Stopped,
}

/// Recurring keepalive: while the liveness marker remains in the document,
/// send a ping over the channel every interval. The first tick fires
/// immediately. Transport errors are swallowed; only the marker's absence
/// stops the loop.
pub struct LivenessPinger {
    interval: Duration,
}

impl Default for LivenessPinger {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessPinger {
    pub fn new() -> Self {
        Self {
            interval: PING_INTERVAL,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    pub async fn run(self, controller: Rc<ChallengeController>, channel: Rc<dyn Channel>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if controller.ping_tick(channel.as_ref()) == PingerStatus::Stopped {
                debug!(target: "challenge", "liveness marker gone, pinger stopped");
                break;
            }
        }
    }
}
