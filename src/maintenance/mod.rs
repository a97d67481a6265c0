use tokio::time::{Duration, sleep};
use tracing::info;

use crate::web::AppState;

const SWEEP_INTERVAL_MINUTES: u64 = 15;

/// Sweeps expired sessions every few minutes for the life of the process.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(SWEEP_INTERVAL_MINUTES * 60);
        loop {
            sleep(interval).await;
            let removed = state.sessions().purge_expired().await;
            if removed > 0 {
                info!(removed, "expired sessions swept");
            }
        }
    });
}
