//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use axum::http::StatusCode;
use resource_board_core::{Board, Session};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The board has a single writer: every handler takes the lock for the whole
/// operation, including any geocoding or receipt rendering it triggers.
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<Mutex<Board>>,
}

impl AppState {
    pub fn new(board: Board) -> Self {
        Self {
            board: Arc::new(Mutex::new(board)),
        }
    }

    /// Locks the board and reads the session under that same guard.
    ///
    /// Session-bound handlers must act through the returned guard: a session
    /// read before the lock may already have been ended by a logout.
    pub async fn lock_with_session(
        &self,
    ) -> Result<(MutexGuard<'_, Board>, Session), (StatusCode, String)> {
        let board = self.board.lock().await;
        let session = board
            .session()
            .cloned()
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Please log in first.".to_string()))?;
        Ok((board, session))
    }
}
