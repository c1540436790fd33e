//! Router configuration for the HTTP API.
//!
//! Sets up all routes and middleware (CORS, compression, tracing).

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Router with permissive CORS.
pub fn create_router(state: AppState) -> Router {
    create_router_with_origins(state, &[])
}

/// Router allowing only `origins`; an empty list allows any origin.
pub fn create_router_with_origins(state: AppState, origins: &[String]) -> Router {
    let api_v1 = Router::new()
        .route("/slots", get(handlers::list_slots))
        // Availability
        .route(
            "/availability",
            get(handlers::list_availability).post(handlers::create_availability),
        )
        .route(
            "/availability/{id}",
            patch(handlers::update_availability).delete(handlers::deactivate_availability),
        )
        // Bookings
        .route(
            "/bookings",
            get(handlers::list_bookings).post(handlers::create_booking),
        )
        .route(
            "/bookings/{id}",
            get(handlers::get_booking).delete(handlers::delete_booking),
        )
        .route("/bookings/{id}/cancel", post(handlers::cancel_booking))
        .route("/bookings/{id}/complete", post(handlers::complete_booking))
        .route("/bookings/{id}/attendance", get(handlers::list_attendance))
        // Attendance
        .route("/attendance", post(handlers::record_attendance))
        .route("/students/{id}/stats", get(handlers::get_student_stats))
        .route(
            "/students/{id}/stats/recompute",
            post(handlers::recompute_student_stats),
        )
        // Packages
        .route("/packages", post(handlers::create_package))
        .route("/packages/{id}", patch(handlers::override_package))
        .route("/users/{id}/packages", get(handlers::list_packages))
        .route("/users/{id}/packages/active", get(handlers::active_package))
        // Users
        .route("/users/{id}", put(handlers::upsert_user))
        .route("/teachers", get(handlers::list_teachers));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::FullRepository;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn FullRepository>;
        create_router(AppState::new(repo))
    }

    fn request(method: &str, uri: &str, identity: Option<(&str, &str)>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some((id, role)) = identity {
            builder = builder.header("x-user-id", id).header("x-user-role", role);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_router_with_origin_list() {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn FullRepository>;
        let _router = create_router_with_origins(
            AppState::new(repo),
            &["https://school.example".to_string(), "bad\norigin".to_string()],
        );
    }

    #[tokio::test]
    async fn test_health_needs_no_identity() {
        let response = app()
            .oneshot(request("GET", "/health", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["database"], "connected");
        assert_eq!(body["calendar"], "disabled");
    }

    #[tokio::test]
    async fn test_missing_identity_is_401() {
        let response = app()
            .oneshot(request("GET", "/v1/bookings", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_student_cannot_create_availability() {
        let body = r#"{"dayOfWeek":1,"startTime":"09:00","endTime":"11:00"}"#;
        let response = app()
            .oneshot(request("POST", "/v1/availability", Some(("7", "STUDENT")), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_teacher_creates_and_lists_availability() {
        let app = app();
        let body = r#"{"dayOfWeek":1,"startTime":"09:00","endTime":"11:00"}"#;
        let response = app
            .clone()
            .oneshot(request("POST", "/v1/availability", Some(("3", "TEACHER")), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["teacherId"], 3);
        assert_eq!(created["isActive"], true);

        let response = app
            .oneshot(request(
                "GET",
                "/v1/availability?teacherId=3",
                Some(("9", "STUDENT")),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = json_body(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_inverted_window_is_400() {
        let body = r#"{"dayOfWeek":1,"startTime":"11:00","endTime":"09:00"}"#;
        let response = app()
            .oneshot(request("POST", "/v1/availability", Some(("3", "TEACHER")), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_unknown_booking_is_404() {
        let response = app()
            .oneshot(request("GET", "/v1/bookings/999", Some(("1", "ADMIN")), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_inverted_slot_range_is_400() {
        let response = app()
            .oneshot(request(
                "GET",
                "/v1/slots?startDate=2026-10-20&endDate=2026-10-19",
                Some(("9", "STUDENT")),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_upserts_and_lists_teachers() {
        let app = app();
        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/v1/users/3",
                Some(("1", "ADMIN")),
                r#"{"displayName":"Ana","role":"TEACHER"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("GET", "/v1/teachers", Some(("9", "STUDENT")), ""))
            .await
            .unwrap();
        let teachers = json_body(response).await;
        assert_eq!(teachers[0]["displayName"], "Ana");
    }

    #[tokio::test]
    async fn test_student_cannot_read_other_packages() {
        let response = app()
            .oneshot(request("GET", "/v1/users/8/packages", Some(("9", "STUDENT")), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
