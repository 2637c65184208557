//! acfunlive library crate.
//!
//! Watches AcFun broadcasters and, per broadcaster, sends live
//! notifications, records the stream and captures the danmu. The binary
//! wires these services together; the library exposes them for integration
//! testing.

pub mod api;
pub mod commands;
pub mod config;
pub mod control;
pub mod danmu;
pub mod error;
pub mod logging;
pub mod notification;
pub mod platform;
pub mod recorder;
pub mod scheduler;
pub mod services;
pub mod shutdown;
pub mod state;
pub mod streamer;
pub mod utils;

pub use error::{Error, Result};
