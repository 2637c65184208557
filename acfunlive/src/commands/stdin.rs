//! Interactive command input.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::CommandHandler;

/// Read commands from standard input, one per line, and print each result.
///
/// The listener is not tracked for shutdown: reading stdin cannot be
/// interrupted, so the task is simply dropped with the runtime.
pub fn spawn_stdin_listener(handler: CommandHandler, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let output = handler.handle_line(&line).await;
                    if !output.is_empty() {
                        println!("{output}");
                    }
                }
                Ok(None) => {
                    debug!("Standard input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read standard input");
                    break;
                }
            }
        }
    })
}
