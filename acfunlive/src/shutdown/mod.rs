//! Shutdown coordination.
//!
//! Shutdown runs once, when the dispatcher receives `quit`. Every step is
//! attempted even if an earlier one failed:
//!
//! 1. stop the web server, bounded by [`WEB_STOP_TIMEOUT`]
//! 2. cancel the root token
//! 3. signal every worker, recording and danmu capture in the state table
//! 4. signal every dangling recording
//! 5. wait for tracked tasks, bounded by the configured grace period

use std::time::Duration;

use tracing::{info, warn};

use crate::control::ControlMessage;
use crate::services::ServiceContainer;

/// Upper bound on stopping the web server.
pub const WEB_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// What the shutdown sequence did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub web_stopped: bool,
    pub workers_signalled: usize,
    pub recordings_stopped: usize,
    pub danmu_cancelled: usize,
    pub dangling_stopped: usize,
    /// Every tracked task finished within the grace period.
    pub drained: bool,
}

pub struct ShutdownCoordinator<'a> {
    services: &'a ServiceContainer,
}

impl<'a> ShutdownCoordinator<'a> {
    pub fn new(services: &'a ServiceContainer) -> Self {
        Self { services }
    }

    pub async fn run(self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if let Some(web) = self.services.take_web() {
            info!("Stopping web server");
            match tokio::time::timeout(WEB_STOP_TIMEOUT, web.stop()).await {
                Ok(Ok(())) => report.web_stopped = true,
                Ok(Err(e)) => warn!(error = %e, "Web server stopped with an error"),
                Err(_) => warn!("Timed out stopping the web server"),
            }
        }

        self.services.cancellation_token().cancel();

        info!("Stopping workers and captures");
        self.services.states.for_each_mut(|uid, state| {
            if let Some(worker) = &state.worker
                && worker.send(ControlMessage::quit()).is_ok()
            {
                report.workers_signalled += 1;
            }
            if let Some(recording) = &state.recording {
                info!(uid, "Stopping recording of {}", recording.info.name);
                recording.request_stop();
                report.recordings_stopped += 1;
            }
            if let Some(danmu) = &state.danmu {
                danmu.cancel();
                report.danmu_cancelled += 1;
            }
        });

        self.services.dangling.for_each(|recording| {
            info!(uid = recording.uid, "Stopping detached recording of {}", recording.info.name);
            recording.request_stop();
            report.dangling_stopped += 1;
        });

        let grace = self.services.config.shutdown_grace();
        info!(grace_secs = grace.as_secs(), "Waiting for captures to finish");
        self.services.tasks.close();
        report.drained = tokio::time::timeout(grace, self.services.tasks.wait())
            .await
            .is_ok();
        if !report.drained {
            warn!("Some tasks did not finish within the grace period");
        }

        info!(?report, "Shutdown complete");
        report
    }
}
