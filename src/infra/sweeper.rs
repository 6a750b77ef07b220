use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::application::use_cases::license::LicenseUseCases;

/// Deletes expired keys on a fixed period. Lookups purge lazily regardless.
pub async fn run_expired_key_sweep_loop(license: Arc<LicenseUseCases>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Expired key sweeper started (every {}s)", period.as_secs());

    loop {
        ticker.tick().await;

        match license.sweep_expired().await {
            Ok(0) => debug!("No expired keys"),
            Ok(purged) => info!(purged, "Swept expired keys"),
            Err(e) => error!(error = ?e, "Expired key sweep failed"),
        }
    }
}
