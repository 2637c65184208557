//! Watched streamers: the persisted roster and the per-streamer intents.

pub mod intent;
pub mod metadata;
pub mod registry;

pub use intent::{Intent, IntentOutcome, QqTarget, add_intent, clear_qq_target, remove_intent, set_qq_target};
pub use metadata::{Notify, Streamer, live_room_url};
pub use registry::{RosterDiff, StreamerRegistry};
