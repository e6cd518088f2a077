use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::reconciler::ScheduleMonitor;

const PASS_TIMEOUT_SECS: u64 = 25;

/// Periodic reconciliation driver. Passes run inline in the tick arm, so
/// they never overlap; with `Skip` behavior a tick that fires while a pass
/// is still in flight is dropped rather than queued.
pub async fn poll_loop(
    monitor: Arc<ScheduleMonitor>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                match tokio::time::timeout(
                    Duration::from_secs(PASS_TIMEOUT_SECS),
                    monitor.poll_once(now),
                )
                .await
                {
                    Ok(Ok(0)) => {}
                    Ok(Ok(new_events)) => {
                        info!("schedule poll recorded {new_events} pending dose(s)");
                    }
                    Ok(Err(err)) => {
                        warn!("schedule poll failed, will retry next tick: {err:#}");
                    }
                    Err(_) => {
                        warn!("schedule poll timed out (> {PASS_TIMEOUT_SECS}s)");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("schedule monitor loop shutting down");
                break;
            }
        }
    }
}
