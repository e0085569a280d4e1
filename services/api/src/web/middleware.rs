//! services/api/src/web/middleware.rs
//!
//! Session middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// Middleware that requires a logged-in session on the board.
///
/// Returns 401 Unauthorized early when nobody is logged in. Handlers still
/// re-read the session under their own board guard via
/// [`AppState::lock_with_session`].
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let logged_in = state.board.lock().await.session().is_some();

    if !logged_in {
        debug!(path = %req.uri().path(), "Rejected request without a session");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
