//! Main control bus and worker mailboxes.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use super::messages::ControlMessage;

/// Capacity of the main bus. Only sized to keep senders from blocking under
/// ordinary load.
pub const MAIN_BUS_CAPACITY: usize = 20;

/// Default timeout for sends when the main bus is full.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Private channel of one cycle worker. Only the worker closes it, by
/// dropping its receiver on exit.
pub type WorkerMailbox = mpsc::UnboundedSender<ControlMessage>;

/// Receiving half of the main bus, owned by the dispatcher.
pub type BusReceiver = mpsc::Receiver<ControlMessage>;

/// Error type for bus sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The dispatcher has stopped and is no longer accepting messages.
    Closed,
    /// The bus is full.
    Full,
    /// The send operation timed out.
    Timeout,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Closed => write!(f, "Control bus is closed"),
            SendError::Full => write!(f, "Control bus is full"),
            SendError::Timeout => write!(f, "Send operation timed out"),
        }
    }
}

impl std::error::Error for SendError {}

/// Sending half of the main bus.
#[derive(Debug, Clone)]
pub struct ControlBus {
    sender: mpsc::Sender<ControlMessage>,
}

impl ControlBus {
    /// Create the bus with the default capacity.
    pub fn new() -> (Self, BusReceiver) {
        Self::with_capacity(MAIN_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, BusReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Send a message, waiting up to [`DEFAULT_SEND_TIMEOUT`] when the bus
    /// is full.
    pub async fn send(&self, msg: ControlMessage) -> Result<(), SendError> {
        self.send_with_timeout(msg, DEFAULT_SEND_TIMEOUT).await
    }

    /// Send a message with a custom timeout.
    pub async fn send_with_timeout(
        &self,
        msg: ControlMessage,
        timeout: Duration,
    ) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                match tokio::time::timeout(timeout, self.sender.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(msg);
                        Ok(())
                    }
                    Ok(Err(_)) => Err(SendError::Closed),
                    Err(_) => Err(SendError::Timeout),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Try to send a message without blocking.
    pub fn try_send(&self, msg: ControlMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
