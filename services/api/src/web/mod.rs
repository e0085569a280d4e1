pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_session;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::{login_handler, logout_handler, register_handler};
use rest::{
    confirm_request_handler, get_session_handler, health_handler, list_history_handler,
    list_listings_handler, list_notifications_handler, map_handler, post_resource_handler,
    receipt_handler, remove_resource_handler, request_pickup_handler, set_location_handler,
    show_section_handler,
};
use state::AppState;

/// Builds the board's API router. CORS and the Swagger UI are added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/location", put(set_location_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/session", get(get_session_handler))
        .route("/session/section", put(show_section_handler))
        .route("/listings", get(list_listings_handler).post(post_resource_handler))
        .route("/listings/{index}/remove", post(remove_resource_handler))
        .route("/listings/{index}/requests", post(request_pickup_handler))
        .route("/map", get(map_handler))
        .route("/notifications", get(list_notifications_handler))
        .route("/requests/{id}/confirm", post(confirm_request_handler))
        .route("/history", get(list_history_handler))
        .route("/history/{id}/receipt", get(receipt_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::{HtmlReceiptAdapter, InMemoryStorageAdapter, SystemClock};
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use resource_board_core::{Board, Coordinates, GeocodingService, PortResult};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedGeocoder;

    #[async_trait]
    impl GeocodingService for FixedGeocoder {
        async fn geocode(&self, _address: &str) -> PortResult<Vec<Coordinates>> {
            Ok(vec![Coordinates::new(51.5034, -0.1276)])
        }
    }

    async fn test_state() -> Arc<AppState> {
        let config = Config::from_lookup(|_| None).expect("default config");
        let board = Board::load(
            Arc::new(InMemoryStorageAdapter::new()),
            Arc::new(FixedGeocoder),
            Arc::new(HtmlReceiptAdapter::new()),
            Arc::new(SystemClock),
            config.device_location,
        )
        .await
        .expect("board");
        Arc::new(AppState::new(board))
    }

    async fn test_app() -> Router {
        router(test_state().await)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_of(body: &str) -> Value {
        serde_json::from_str(body).unwrap_or_else(|e| panic!("not JSON ({e}): {body}"))
    }

    async fn login(app: &Router, name: &str, role: &str) {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth/login",
            Some(json!({"name": name, "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn register_asha(app: &Router) {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth/register",
            Some(json!({"name": "Asha", "address": "10 Downing St", "phone": "555-0101", "resource": "Rice"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    #[tokio::test]
    async fn health__should_respond_ok() {
        // When
        let (status, body) = send(&test_app().await, Method::GET, "/health", None).await;

        // Then
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn protected_routes__should_require_a_session() {
        // Given
        let app = test_app().await;

        // When
        let (status, _) = send(&app, Method::GET, "/listings", None).await;

        // Then
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register__should_report_geocoded_location() {
        // Given
        let app = test_app().await;

        // When
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/register",
            Some(json!({"name": "Asha", "address": "10 Downing St", "phone": "555-0101", "resource": "Rice"})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::CREATED);
        let body = json_of(&body);
        assert_eq!(body["locationSource"], "geocoded");
        assert_eq!(body["message"], "Registered successfully! You can login now.");
        assert_eq!(body["helper"]["lat"], 51.5034);
    }

    #[tokio::test]
    async fn register__should_reject_duplicate_names() {
        // Given
        let app = test_app().await;
        register_asha(&app).await;

        // When
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/register",
            Some(json!({"name": "ASHA", "address": "x", "phone": "1", "resource": "Tea"})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "This name is already registered.");
    }

    #[tokio::test]
    async fn login__should_refuse_unregistered_helpers() {
        // When
        let (status, body) = send(
            &test_app().await,
            Method::POST,
            "/auth/login",
            Some(json!({"name": "Nobody", "role": "helper"})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Helper not registered. Please register first.");
    }

    #[tokio::test]
    async fn session__should_list_needer_views_only() {
        // Given
        let app = test_app().await;
        login(&app, "Sam", "needer").await;

        // When
        let (status, body) = send(&app, Method::GET, "/session", None).await;
        let (section_status, _) = send(
            &app,
            Method::PUT,
            "/session/section",
            Some(json!({"section": "post"})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["role"], "user");
        assert_eq!(body["activeSection"], "map");
        assert_eq!(body["sections"], json!(["map", "history"]));
        assert_eq!(section_status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn logout__should_do_nothing_unless_confirmed() {
        // Given
        let app = test_app().await;
        login(&app, "Sam", "user").await;

        // When
        let (_, declined) = send(&app, Method::POST, "/auth/logout", Some(json!({}))).await;
        let (still_in, _) = send(&app, Method::GET, "/session", None).await;
        let (_, confirmed) = send(
            &app,
            Method::POST,
            "/auth/logout",
            Some(json!({"confirm": true})),
        )
        .await;
        let (after, _) = send(&app, Method::GET, "/session", None).await;

        // Then
        assert_eq!(json_of(&declined)["loggedOut"], false);
        assert_eq!(still_in, StatusCode::OK);
        assert_eq!(json_of(&confirmed)["loggedOut"], true);
        assert_eq!(after, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn location__should_reject_out_of_range_coordinates() {
        // When
        let (status, _) = send(
            &test_app().await,
            Method::PUT,
            "/location",
            Some(json!({"lat": 91.0, "lng": 0.0})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pickup_flow__should_archive_request_and_clear_listing() {
        // Given
        let app = test_app().await;
        register_asha(&app).await;
        login(&app, "Sam", "user").await;

        let (_, listings) = send(&app, Method::GET, "/listings", None).await;
        assert_eq!(json_of(&listings)["listings"][0]["action"], "request_pickup");

        // When: Sam requests the rice, twice
        let (status, body) = send(&app, Method::POST, "/listings/0/requests", None).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let request_id = json_of(&body)["request"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        let (duplicate, _) = send(&app, Method::POST, "/listings/0/requests", None).await;

        // When: Asha confirms it
        login(&app, "asha", "helper").await;
        let (_, inbox) = send(&app, Method::GET, "/notifications", None).await;
        let (status, confirmed) = send(
            &app,
            Method::POST,
            &format!("/requests/{request_id}/confirm"),
            Some(json!({"confirm": true})),
        )
        .await;

        // Then
        assert_eq!(duplicate, StatusCode::BAD_REQUEST);
        let inbox = json_of(&inbox);
        assert_eq!(inbox["notifications"][0]["canConfirm"], true);
        assert_eq!(status, StatusCode::OK, "{confirmed}");
        let confirmed = json_of(&confirmed);
        assert_eq!(confirmed["confirmed"], true);
        assert_eq!(confirmed["request"]["status"], "confirmed");
        assert_eq!(confirmed["removedListings"], 2);
        assert!(confirmed["receiptHtml"].as_str().unwrap().contains("Sam"));

        let (_, listings) = send(&app, Method::GET, "/listings", None).await;
        assert_eq!(json_of(&listings)["listings"], json!([]));
        let (_, inbox) = send(&app, Method::GET, "/notifications", None).await;
        assert_eq!(json_of(&inbox)["notifications"], json!([]));

        // And: Sam can reprint the receipt from history
        login(&app, "Sam", "user").await;
        let (_, history) = send(&app, Method::GET, "/history", None).await;
        let history = json_of(&history);
        assert_eq!(history["history"][0]["canReprint"], true);
        let entry_id = history["history"][0]["entry"]["id"].as_str().unwrap().to_string();
        let receipt_uri = format!("/history/{entry_id}/receipt");
        let (status, page) = send(&app, Method::GET, &receipt_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("<strong>Resource:</strong> Rice"));
    }

    #[tokio::test]
    async fn confirm__should_refuse_other_helpers() {
        // Given
        let app = test_app().await;
        register_asha(&app).await;
        send(
            &app,
            Method::POST,
            "/auth/register",
            Some(json!({"name": "Ben", "address": "1 High St", "phone": "555-0202", "resource": "Bread"})),
        )
        .await;
        login(&app, "Sam", "user").await;
        let (_, body) = send(&app, Method::POST, "/listings/0/requests", None).await;
        let request_id = json_of(&body)["request"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        // When
        login(&app, "Ben", "helper").await;
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/requests/{request_id}/confirm"),
            Some(json!({"confirm": true})),
        )
        .await;

        // Then
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_resource__should_place_listing_at_device_location() {
        // Given
        let app = test_app().await;
        register_asha(&app).await;
        login(&app, "Asha", "helper").await;
        send(&app, Method::PUT, "/location", Some(json!({"lat": 40.0, "lng": -3.0}))).await;

        // When
        let (status, body) = send(
            &app,
            Method::POST,
            "/listings",
            Some(json!({"resource": "Blankets"})),
        )
        .await;
        let (_, map) = send(&app, Method::GET, "/map", None).await;

        // Then
        assert_eq!(status, StatusCode::CREATED);
        let listing = &json_of(&body)["listing"];
        assert_eq!(listing["resource"], "Blankets");
        assert_eq!(listing["lat"], 40.0);
        let map = json_of(&map);
        assert_eq!(map["map"]["center"], json!({"lat": 40.0, "lng": -3.0}));
    }

    #[tokio::test]
    async fn post_resource__should_be_refused_when_a_queued_logout_ends_the_session() {
        // Given: Asha is logged in and another operation holds the board
        let state = test_state().await;
        let app = router(state.clone());
        register_asha(&app).await;
        login(&app, "Asha", "helper").await;
        let busy = state.board.lock().await;

        // When: a post queues for the board first, then a logout
        let post = tokio::spawn({
            let app = app.clone();
            async move {
                send(
                    &app,
                    Method::POST,
                    "/listings",
                    Some(json!({"resource": "Posted after logout"})),
                )
                .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let logout = tokio::spawn({
            let app = app.clone();
            async move {
                send(&app, Method::POST, "/auth/logout", Some(json!({"confirm": true}))).await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(busy);
        let (post_status, _) = post.await.unwrap();
        let (logout_status, _) = logout.await.unwrap();

        // Then
        assert_eq!(logout_status, StatusCode::OK);
        assert_eq!(post_status, StatusCode::UNAUTHORIZED);
        let board = state.board.lock().await;
        assert!(board.session().is_none());
        assert!(board
            .state()
            .helpers
            .iter()
            .all(|h| h.resource.as_deref() != Some("Posted after logout")));
    }
}
