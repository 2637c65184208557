//! Main-bus dispatcher.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::worker::CycleWorker;
use crate::control::{BusReceiver, ControlMessage, ControlVerb};
use crate::services::ServiceContainer;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};

/// Drains the main control bus. Runs until a `quit` message has been
/// handled, then returns the shutdown report.
pub struct Dispatcher {
    services: Arc<ServiceContainer>,
    receiver: BusReceiver,
}

impl Dispatcher {
    pub fn new(services: Arc<ServiceContainer>, receiver: BusReceiver) -> Self {
        Self { services, receiver }
    }

    pub async fn run(mut self) -> ShutdownReport {
        info!("Dispatcher started");
        while let Some(msg) = self.receiver.recv().await {
            if msg.verb == ControlVerb::Quit {
                info!("Quit requested");
                return ShutdownCoordinator::new(&self.services).run().await;
            }
            self.dispatch(msg);
        }

        warn!("Control bus closed without a quit message");
        ShutdownCoordinator::new(&self.services).run().await
    }

    fn dispatch(&self, msg: ControlMessage) {
        let uid = msg.uid();
        match msg.verb {
            ControlVerb::StartCycle => {
                CycleWorker::spawn(&self.services, &msg.streamer);
            }
            ControlVerb::StopCycle | ControlVerb::LiveOff => self.forward(msg),
            ControlVerb::StopRecord => {
                self.services.recorder.stop_recording(uid);
            }
            ControlVerb::Quit => {}
        }
    }

    /// Deliver a message to the addressed worker's mailbox.
    fn forward(&self, msg: ControlMessage) {
        let uid = msg.uid();
        let verb = msg.verb;
        let delivered = self
            .services
            .states
            .get(uid)
            .and_then(|state| state.worker)
            .is_some_and(|worker| worker.send(msg).is_ok());
        if delivered {
            debug!(uid, %verb, "Forwarded control message");
        } else {
            debug!(uid, %verb, "No worker to forward control message to");
        }
    }
}
