//! Control messages exchanged between the dispatcher and the workers.
//!
//! - [`ControlBus`]: the bounded main bus drained by the dispatcher
//! - [`WorkerMailbox`]: the private channel of one cycle worker

pub mod bus;
pub mod messages;

pub use bus::{BusReceiver, ControlBus, MAIN_BUS_CAPACITY, SendError, WorkerMailbox};
pub use messages::{ControlMessage, ControlVerb};
