//! API server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::routes::{ApiState, create_router};
use crate::commands::CommandHandler;
use crate::error::{Error, Result};
use crate::services::ServiceContainer;

/// A running web server.
#[derive(Debug)]
pub struct WebServerHandle {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl WebServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Ask the server to shut down without waiting for it.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Shut down and wait for in-flight requests to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancel_token.cancel();
        self.task
            .await
            .map_err(|e| Error::Api(format!("Server task failed: {e}")))?
    }
}

/// Bind `127.0.0.1:<web_port>` and serve the API. Returns `false` when a
/// server is already running.
pub async fn start_web(services: &Arc<ServiceContainer>) -> Result<bool> {
    if services.web_running() {
        warn!("Web server is already running");
        return Ok(false);
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], services.config.web_port));
    let listener = TcpListener::bind(addr).await?;
    let handle = serve(listener, services.clone())?;

    match services.install_web(handle) {
        Ok(()) => {
            info!("Web server listening on http://{}", addr);
            Ok(true)
        }
        Err(duplicate) => {
            duplicate.shutdown();
            warn!("Web server is already running");
            Ok(false)
        }
    }
}

/// Signal the running web server to stop. Returns `false` when none runs.
///
/// The server finishes in-flight requests, including the one that may have
/// issued this call, after it returns.
pub async fn stop_web(services: &ServiceContainer) -> bool {
    match services.take_web() {
        Some(handle) => {
            info!("Stopping web server on http://{}", handle.addr());
            handle.shutdown();
            true
        }
        None => {
            warn!("Web server is not running");
            false
        }
    }
}

fn serve(listener: TcpListener, services: Arc<ServiceContainer>) -> Result<WebServerHandle> {
    let addr = listener.local_addr()?;
    let state = ApiState {
        log_tail: services.log_tail.clone(),
        commands: CommandHandler::new(services),
    };
    let router = create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Web server shutting down...");
            })
            .await
            .map_err(|e| Error::Api(format!("Server error: {e}")))
    });

    Ok(WebServerHandle {
        addr,
        cancel_token,
        task,
    })
}
