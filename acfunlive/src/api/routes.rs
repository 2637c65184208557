//! Route handlers.

use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;

use crate::commands::{CommandHandler, help_text};
use crate::logging::LogTail;

/// State shared by the route handlers.
#[derive(Clone)]
pub struct ApiState {
    pub commands: CommandHandler,
    pub log_tail: LogTail,
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/log", get(log))
        .route("/cmd/{cmd}", get(command))
        .route("/cmd/{cmd}/{uid}", get(command_uid))
        .route("/cmd/{cmd}/{uid}/{qq}", get(command_qq))
        .with_state(state)
}

async fn index() -> String {
    help_text()
}

async fn log(State(state): State<ApiState>) -> String {
    state.log_tail.render()
}

async fn command(State(state): State<ApiState>, Path(cmd): Path<String>) -> String {
    state.commands.handle(&cmd, &[]).await
}

async fn command_uid(
    State(state): State<ApiState>,
    Path((cmd, uid)): Path<(String, String)>,
) -> String {
    state.commands.handle(&cmd, &[uid.as_str()]).await
}

async fn command_qq(
    State(state): State<ApiState>,
    Path((cmd, uid, qq)): Path<(String, String, String)>,
) -> String {
    state.commands.handle(&cmd, &[uid.as_str(), qq.as_str()]).await
}
