//! Application service wiring.

mod container;

pub use container::{Collaborators, ServiceContainer};
