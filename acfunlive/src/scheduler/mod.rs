//! Scheduling of per-streamer work.
//!
//! - [`CycleWorker`]: one polling task per watched streamer
//! - [`Dispatcher`]: drains the main control bus
//! - [`roster`]: applies roster file changes to running workers
//! - [`refresh`]: keeps the live-room listing fresh

mod dispatcher;
pub mod refresh;
pub mod roster;
mod worker;

pub use dispatcher::Dispatcher;
pub use refresh::{refresh_live_rooms, spawn_live_room_refresher};
pub use roster::{spawn_roster_sync, sync_roster};
pub use worker::CycleWorker;
