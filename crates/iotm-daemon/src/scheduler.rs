//! Periodic-tick scheduler.
//!
//! §5: "A periodic tick runs every fixed interval (≈ 5 s) and calls each
//! session's `periodic` serially." The whole daemon is single-threaded and
//! cooperative; this is the one background task, and it never overlaps
//! itself — each tick waits for the previous `periodic_tick` call to
//! return before the next `tokio::time::interval` fires.

use std::sync::Arc;
use std::time::Duration;

use crate::session::Manager;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// Drive `manager.periodic_tick()` on a fixed interval until `shutdown`
/// resolves. Runs as a plain async loop rather than a spawned detached
/// task so the caller controls its lifetime explicitly.
pub async fn run(manager: Arc<Manager>, period: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.periodic_tick();
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    log::info!("scheduler: shutdown signalled, stopping periodic tick");
                    return;
                }
            }
        }
    }
}
