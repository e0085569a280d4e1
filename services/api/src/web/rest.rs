//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the board's REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use resource_board_core::projection::{self, HistoryView, ListingView, MapView, NotificationView};
use resource_board_core::{
    BoardError, ConfirmOutcome, Coordinates, Helper, PickupHistoryEntry, PickupRequest, Section,
    Session,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        set_location_handler,
        get_session_handler,
        show_section_handler,
        list_listings_handler,
        post_resource_handler,
        remove_resource_handler,
        request_pickup_handler,
        map_handler,
        list_notifications_handler,
        confirm_request_handler,
        list_history_handler,
        receipt_handler,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::RegisterResponse,
        auth::LoginRequest,
        auth::LogoutResponse,
        ConfirmBody,
        SessionResponse,
        SectionRequest,
        LocationRequest,
        PostResourceRequest,
        ListingResponse,
        ListingsResponse,
        RemoveResourceResponse,
        PickupRequestResponse,
        MapResponse,
        NotificationsResponse,
        ConfirmResponse,
        HistoryResponse,
    )),
    tags(
        (name = "Resource Board API", description = "API endpoints for the community resource-sharing board.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a rejected board operation to an HTTP rejection.
///
/// Client errors carry the board's own message; server errors are logged and
/// replaced with a generic `Failed to <action>`.
pub(crate) fn reject(action: &str, err: BoardError) -> (StatusCode, String) {
    let status = match &err {
        BoardError::Validation(_) => StatusCode::BAD_REQUEST,
        BoardError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        BoardError::NotFound(_) => StatusCode::NOT_FOUND,
        BoardError::Storage(_) | BoardError::Collaborator(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Failed to {}: {:?}", action, err);
        (status, format!("Failed to {action}"))
    } else {
        (status, err.to_string())
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The answer to a confirmation prompt. Omitting it counts as declining.
#[derive(Deserialize, Default, ToSchema)]
pub struct ConfirmBody {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub name: String,
    pub role: String,
    pub active_section: String,
    /// The views this session may open, in navigation order.
    pub sections: Vec<String>,
}

impl SessionResponse {
    pub fn new(session: &Session, active_section: Section) -> Self {
        Self {
            name: session.name.clone(),
            role: session.role.as_str().to_string(),
            active_section: active_section.as_str().to_string(),
            sections: projection::visible_sections(session)
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SectionRequest {
    pub section: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct LocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct PostResourceRequest {
    pub resource: String,
}

#[derive(Serialize, ToSchema)]
pub struct ListingResponse {
    #[schema(value_type = Object)]
    pub listing: Helper,
}

#[derive(Serialize, ToSchema)]
pub struct ListingsResponse {
    #[schema(value_type = Vec<Object>)]
    pub listings: Vec<ListingView>,
}

#[derive(Serialize, ToSchema)]
pub struct RemoveResourceResponse {
    /// The listing taken off the board, absent when the removal was declined.
    #[schema(value_type = Option<Object>)]
    pub removed: Option<Helper>,
}

#[derive(Serialize, ToSchema)]
pub struct PickupRequestResponse {
    #[schema(value_type = Object)]
    pub request: PickupRequest,
}

#[derive(Serialize, ToSchema)]
pub struct MapResponse {
    #[schema(value_type = Object)]
    pub map: MapView,
}

#[derive(Serialize, ToSchema)]
pub struct NotificationsResponse {
    #[schema(value_type = Vec<Object>)]
    pub notifications: Vec<NotificationView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub confirmed: bool,
    #[schema(value_type = Option<Object>)]
    pub request: Option<PickupRequest>,
    #[schema(value_type = Option<Object>)]
    pub history_entry: Option<PickupHistoryEntry>,
    pub removed_listings: usize,
    /// The printable receipt page, absent if it could not be rendered.
    pub receipt_html: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<HistoryView>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Set the current device location.
///
/// Used as the position of newly posted resources and as the fallback when an
/// address can't be geocoded. Kept in memory only.
#[utoipa::path(
    put,
    path = "/location",
    request_body = LocationRequest,
    responses(
        (status = 200, description = "Location updated", body = LocationRequest),
        (status = 400, description = "Coordinates out of range")
    )
)]
pub async fn set_location_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<LocationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut board = app_state.board.lock().await;
    let location = board
        .set_device_location(Coordinates::new(req.lat, req.lng))
        .map_err(|e| reject("set the device location", e))?;
    Ok(Json(LocationRequest {
        lat: location.lat,
        lng: location.lng,
    }))
}

/// Get the current session and the views it may open.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "The active session", body = SessionResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    let (board, session) = app_state.lock_with_session().await?;
    Ok(Json(SessionResponse::new(&session, board.active_section())))
}

/// Open a view, remembering it as the last active section.
#[utoipa::path(
    put,
    path = "/session/section",
    request_body = SectionRequest,
    responses(
        (status = 200, description = "Section recorded", body = SessionResponse),
        (status = 400, description = "Unknown section"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "View not available to this role")
    )
)]
pub async fn show_section_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SectionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let section: Section = req
        .section
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid section: {e}")))?;

    let (mut board, session) = app_state.lock_with_session().await?;
    let section = board
        .show_section(section, &session)
        .await
        .map_err(|e| reject("record the active section", e))?;
    Ok(Json(SessionResponse::new(&session, section)))
}

/// List the active listings with the action available on each.
#[utoipa::path(
    get,
    path = "/listings",
    responses(
        (status = 200, description = "Active listings in board order", body = ListingsResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_listings_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ListingsResponse>, (StatusCode, String)> {
    let (board, session) = app_state.lock_with_session().await?;
    Ok(Json(ListingsResponse {
        listings: projection::active_listings(board.state(), Some(&session)),
    }))
}

/// Post (or replace) the logged-in helper's resource at the device location.
#[utoipa::path(
    post,
    path = "/listings",
    request_body = PostResourceRequest,
    responses(
        (status = 201, description = "Resource posted", body = ListingResponse),
        (status = 400, description = "Empty resource"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Only helpers can post"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn post_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<PostResourceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mut board, session) = app_state.lock_with_session().await?;
    let listing = board
        .post_resource(&req.resource, &session)
        .await
        .map_err(|e| reject("post the resource", e))?;
    Ok((StatusCode::CREATED, Json(ListingResponse { listing })))
}

/// Remove one of the logged-in helper's own listings.
#[utoipa::path(
    post,
    path = "/listings/{index}/remove",
    request_body = ConfirmBody,
    responses(
        (status = 200, description = "Removed, or nothing done when declined", body = RemoveResourceResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the owner of the listing"),
        (status = 404, description = "No listing at this index"),
        (status = 500, description = "Internal server error")
    ),
    params(("index" = usize, Path, description = "Position of the listing on the board."))
)]
pub async fn remove_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(body): Json<ConfirmBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mut board, session) = app_state.lock_with_session().await?;
    let removed = board
        .remove_resource(index, &session, body.confirm.into())
        .await
        .map_err(|e| reject("remove the resource", e))?;
    Ok(Json(RemoveResourceResponse { removed }))
}

/// Request pickup of the listing at `index`, notifying its helper.
#[utoipa::path(
    post,
    path = "/listings/{index}/requests",
    responses(
        (status = 201, description = "Request filed", body = PickupRequestResponse),
        (status = 400, description = "A pending request already exists"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Only needers can request pickup"),
        (status = 404, description = "No listing at this index"),
        (status = 500, description = "Internal server error")
    ),
    params(("index" = usize, Path, description = "Position of the listing on the board."))
)]
pub async fn request_pickup_handler(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mut board, session) = app_state.lock_with_session().await?;
    let request = board
        .request_pickup(index, &session)
        .await
        .map_err(|e| reject("request the pickup", e))?;
    Ok((StatusCode::CREATED, Json(PickupRequestResponse { request })))
}

/// Markers for every listing plus the device location, with padded bounds.
#[utoipa::path(
    get,
    path = "/map",
    responses(
        (status = 200, description = "The map projection", body = MapResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn map_handler(State(app_state): State<Arc<AppState>>) -> Json<MapResponse> {
    let board = app_state.board.lock().await;
    Json(MapResponse {
        map: projection::map_view(board.state(), board.device_location()),
    })
}

/// The logged-in helper's notification inbox.
#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Notifications addressed to the session", body = NotificationsResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_notifications_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<NotificationsResponse>, (StatusCode, String)> {
    let (board, session) = app_state.lock_with_session().await?;
    Ok(Json(NotificationsResponse {
        notifications: projection::notifications_for(board.state(), &session),
    }))
}

/// Confirm a pending pickup request, archiving it and printing a receipt.
#[utoipa::path(
    post,
    path = "/requests/{id}/confirm",
    request_body = ConfirmBody,
    responses(
        (status = 200, description = "Confirmed, or nothing done when declined", body = ConfirmResponse),
        (status = 400, description = "Request already confirmed"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the request's helper"),
        (status = 404, description = "Request not found"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = Uuid, Path, description = "The pickup request ID."))
)]
pub async fn confirm_request_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (mut board, session) = app_state.lock_with_session().await?;
    let outcome = board
        .confirm_pickup_request(id, &session, body.confirm.into())
        .await
        .map_err(|e| reject("confirm the request", e))?;

    let response = match outcome {
        ConfirmOutcome::Declined => ConfirmResponse {
            confirmed: false,
            request: None,
            history_entry: None,
            removed_listings: 0,
            receipt_html: None,
        },
        ConfirmOutcome::Confirmed(confirmation) => {
            info!(
                request_id = %id,
                removed = confirmation.removed_listings,
                "Request confirmed over HTTP"
            );
            ConfirmResponse {
                confirmed: true,
                request: Some(confirmation.request),
                history_entry: Some(confirmation.entry),
                removed_listings: confirmation.removed_listings,
                receipt_html: confirmation.receipt,
            }
        }
    };
    Ok(Json(response))
}

/// Past pickups, newest first, with reprint permission per entry.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Pickup history", body = HistoryResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let (board, session) = app_state.lock_with_session().await?;
    Ok(Json(HistoryResponse {
        history: projection::history_for(board.state(), &session),
    }))
}

/// Reprint the receipt of a past pickup as a printable HTML page.
#[utoipa::path(
    get,
    path = "/history/{id}/receipt",
    responses(
        (status = 200, description = "The receipt page", content_type = "text/html", body = String),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not a party to this pickup"),
        (status = 404, description = "History entry not found"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = Uuid, Path, description = "The history entry ID."))
)]
pub async fn receipt_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, (StatusCode, String)> {
    let (board, session) = app_state.lock_with_session().await?;
    let page = board
        .reprint_receipt(id, &session)
        .await
        .map_err(|e| reject("render the receipt", e))?;
    Ok(Html(page))
}
