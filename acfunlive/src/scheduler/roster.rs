//! Applies roster changes to the running workers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::control::ControlMessage;
use crate::error::Result;
use crate::services::ServiceContainer;
use crate::streamer::RosterDiff;

/// Reload the roster file if it changed on disk and apply every change made
/// since the previous sync.
///
/// Added streamers get a worker through the main bus. Removed streamers have
/// their worker stopped and any recording detached. Changed streamers are
/// flagged so their worker re-reads the settings on its next poll.
pub async fn sync_roster(services: &ServiceContainer) -> Result<RosterDiff> {
    if services.registry.reload_if_changed()? {
        info!("Roster file changed on disk, reloaded");
    }
    let diff = services.registry.take_diff();
    if diff.is_empty() {
        return Ok(diff);
    }

    for streamer in &diff.added {
        info!(uid = streamer.uid, "Added {}", streamer.long_id());
        if let Err(e) = services.bus.send(ControlMessage::start_cycle(streamer.clone())).await {
            warn!(uid = streamer.uid, error = %e, "Failed to request a worker");
        }
    }

    for streamer in &diff.removed {
        info!(uid = streamer.uid, "Removed {}", streamer.long_id());
        if let Some(worker) = services.states.get(streamer.uid).and_then(|s| s.worker) {
            let _ = worker.send(ControlMessage::stop_cycle(streamer.clone()));
        }
        services.recorder.detach_recording(streamer.uid);
        services.states.try_delete(streamer.uid, &services.registry);
    }

    for streamer in &diff.changed {
        debug!(uid = streamer.uid, "Settings of {} changed", streamer.long_id());
        services.states.mark_modified(streamer.uid);
    }

    Ok(diff)
}

/// Spawn the periodic roster sync task.
pub fn spawn_roster_sync(services: Arc<ServiceContainer>) -> JoinHandle<()> {
    let cancel = services.cancellation_token();
    let tracker = services.tasks.clone();
    tracker.spawn(async move {
        let mut ticker = tokio::time::interval(services.config.roster_reload_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = sync_roster(&services).await {
                        warn!(error = %e, "Roster sync failed");
                    }
                }
            }
        }
        debug!("Roster sync stopped");
    })
}
