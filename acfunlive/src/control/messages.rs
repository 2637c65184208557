//! Control message types.

use crate::streamer::Streamer;

/// Control verbs understood by the dispatcher, the workers and the
/// recording supervisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum ControlVerb {
    /// The streamer must be (re)watched.
    StartCycle,
    /// The streamer's worker should leave its polling loop.
    StopCycle,
    /// The streamer just went offline.
    LiveOff,
    /// The video capture should end.
    StopRecord,
    /// Global shutdown.
    Quit,
}

/// A control verb addressed to one streamer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub streamer: Streamer,
    pub verb: ControlVerb,
}

impl ControlMessage {
    pub fn new(streamer: Streamer, verb: ControlVerb) -> Self {
        Self { streamer, verb }
    }

    pub fn start_cycle(streamer: Streamer) -> Self {
        Self::new(streamer, ControlVerb::StartCycle)
    }

    pub fn stop_cycle(streamer: Streamer) -> Self {
        Self::new(streamer, ControlVerb::StopCycle)
    }

    /// The global shutdown message; it is not addressed to any streamer.
    pub fn quit() -> Self {
        Self::new(Streamer::default(), ControlVerb::Quit)
    }

    pub fn uid(&self) -> u64 {
        self.streamer.uid
    }
}
