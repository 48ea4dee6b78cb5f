use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use backend_application::commands::sync_commands;
use backend_application::AppState;

/// Runs `sync_all_scans` every `sync_interval_seconds` until `shutdown` flips
/// to true or its sender is dropped. A round in progress is always finished.
pub async fn schedule_sync(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.config.sync_interval_seconds;
    if period == 0 {
        info!("background sync disabled");
        return;
    }

    let mut ticker = interval(Duration::from_secs(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick fires immediately
    ticker.tick().await;
    info!(interval_seconds = period, "background sync started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                match sync_commands::sync_all_scans(&state).await {
                    Ok(result) => info!(attempted = result.attempted, "background sync round"),
                    Err(err) => error!("background sync round failed: {}", err),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("background sync stopped");
}
