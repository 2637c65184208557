//! Periodic refresh of the live-room listing.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::services::ServiceContainer;

/// Fetch the live-room listing into the cache. Returns the number of rooms.
pub async fn refresh_live_rooms(services: &ServiceContainer) -> Result<usize> {
    let rooms = services.client.live_rooms().await?;
    let count = rooms.len();
    *services.live_rooms.write() = rooms;
    debug!(count, "Refreshed live rooms");
    Ok(count)
}

/// Spawn the periodic live-room refresher.
pub fn spawn_live_room_refresher(services: Arc<ServiceContainer>) -> JoinHandle<()> {
    let cancel = services.cancellation_token();
    let tracker = services.tasks.clone();
    tracker.spawn(async move {
        let mut ticker = tokio::time::interval(services.config.live_list_refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = refresh_live_rooms(&services).await {
                        warn!(error = %e, "Failed to refresh live rooms");
                    }
                }
            }
        }
    })
}
