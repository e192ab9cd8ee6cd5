pub mod error;
pub mod slack_actions;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::{ApiError, ApiResult};

/// Build the interactive router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Slack interactivity (buttons and modal submissions)
        .route("/slack/actions", post(slack_actions::slack_actions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET /health - Liveness plus a storage round trip
async fn health_check(State(state): State<AppState>) -> ApiResult<&'static str> {
    let conn = state.db.connection()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok("OK")
}
