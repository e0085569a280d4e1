//! services/api/src/web/auth.rs
//!
//! Identity endpoints: helper registration, login and logout.
//!
//! There are no credentials. The board holds at most one session, like a
//! single shared kiosk, and logging in replaces it.

use crate::web::rest::{reject, ConfirmBody, SessionResponse};
use crate::web::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use resource_board_core::{Helper, LocationSource, RegistrationForm, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub resource: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    /// `geocoded`, `no_match` or `lookup_failed`.
    #[schema(value_type = String)]
    pub location_source: LocationSource,
    #[schema(value_type = Object)]
    pub helper: Helper,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub name: String,
    /// `helper`, or `user` (also accepted as `needer`).
    pub role: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Register a helper and publish their first listing
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Helper registered", body = RegisterResponse),
        (status = 400, description = "Missing fields or duplicate name"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let form = RegistrationForm {
        name: req.name,
        address: req.address,
        phone: req.phone,
        resource: req.resource,
    };

    let mut board = state.board.lock().await;
    let registration = board
        .register_helper(form)
        .await
        .map_err(|e| reject("register the helper", e))?;

    let response = RegisterResponse {
        message: registration.message().to_string(),
        location_source: registration.location_source,
        helper: registration.helper,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Start a session as a helper or a needer
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 400, description = "Missing name or unknown role"),
        (status = 403, description = "Helper not registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let role: Role = req
        .role
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid role: {e}")))?;

    let mut board = state.board.lock().await;
    let session = board
        .login(&req.name, role)
        .await
        .map_err(|e| reject("log in", e))?;

    Ok(Json(SessionResponse::new(&session, board.active_section())))
}

/// POST /auth/logout - End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = ConfirmBody,
    responses(
        (status = 200, description = "Logged out, or nothing done when declined", body = LogoutResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfirmBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut board = state.board.lock().await;
    let logged_out = board
        .logout(body.confirm.into())
        .await
        .map_err(|e| reject("log out", e))?;
    Ok(Json(LogoutResponse { logged_out }))
}
