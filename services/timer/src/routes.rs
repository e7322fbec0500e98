//! Timer API routes

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::ApiResult,
    models::{
        CheckResponse, DeactivateRequest, DeactivateResponse, ExtendRequest, ExtendResponse,
        SessionLookupQuery, SessionView, StartRequest, StartResponse, ValidateQuery,
        ValidateResponse,
    },
    service::ExtendCommand,
    state::AppState,
};

/// Create the router for the timer API
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/start", post(start_session).get(check_session))
        .route("/check-session", get(check_session))
        .route("/validate", get(validate_session))
        .route("/extend", post(extend_session))
        .route("/deactivate", post(deactivate_session));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.session_service.health_check().await {
        Ok(true) => "ok",
        _ => "unavailable",
    };

    Json(json!({
        "status": "ok",
        "service": "timer-service",
        "database": database,
    }))
}

/// Start a timer session
pub async fn start_session(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    let session = state
        .session_service
        .start(payload.access_token.as_deref(), payload.duration)
        .await?;

    let response = StartResponse {
        session_id: session.session_id,
        start_time: session.start_time,
        duration: session.duration,
        message: "Timer started successfully".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Look up the active session by access token or session id
pub async fn check_session(
    State(state): State<AppState>,
    query: Result<Query<SessionLookupQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;

    let session = state
        .session_service
        .check(query.session_id.as_deref(), query.access_token.as_deref())
        .await?;

    let now = Utc::now();
    Ok(Json(CheckResponse {
        session: session.map(|s| SessionView::at(&s, now)),
    }))
}

/// Validate that a session id names an active session
pub async fn validate_session(
    State(state): State<AppState>,
    query: Result<Query<ValidateQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;

    state
        .session_service
        .validate(query.session_id.as_deref())
        .await?;

    Ok(Json(ValidateResponse { valid: true }))
}

/// Extend an active session
pub async fn extend_session(
    State(state): State<AppState>,
    payload: Result<Json<ExtendRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    let command = ExtendCommand {
        session_id: payload.session_id,
        access_token: payload.access_token,
        member_id: payload.member_id,
        extended_minutes: payload.extended_minutes,
    };
    let extension = state.session_service.extend(&command).await?;

    Ok(Json(ExtendResponse {
        success: true,
        session_id: extension.session.session_id,
        start_time: extension.session.start_time,
        new_duration: extension.session.duration,
        extend_period: extension.granted_seconds,
    }))
}

/// Deactivate an active session
pub async fn deactivate_session(
    State(state): State<AppState>,
    payload: Result<Json<DeactivateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    let session = state
        .session_service
        .deactivate(payload.session_id.as_deref(), payload.access_token.as_deref())
        .await?;

    Ok(Json(DeactivateResponse {
        success: true,
        session_id: session.session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gate::{ExtensionGate, WebhookGate},
        repositories::MemorySessionStore,
        service::SessionService,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn app() -> Router {
        let service = SessionService::new(Arc::new(MemorySessionStore::new()), None);
        create_router(AppState::new(service))
    }

    fn gated_app(gate_url: String) -> Router {
        let gate: Arc<dyn ExtensionGate> =
            Arc::new(WebhookGate::new(gate_url, Duration::from_secs(5)).unwrap());
        let service = SessionService::new(Arc::new(MemorySessionStore::new()), Some(gate));
        create_router(AppState::new(service))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let (status, body) = send(&app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_start_then_extend_scenario() {
        let app = app();

        let (status, started) = send(
            &app,
            post_json("/api/start", json!({"accessToken": "tok1", "duration": 600})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(started["duration"], 600);
        let session_id = started["sessionId"].as_str().unwrap().to_string();

        let (status, extended) = send(
            &app,
            post_json(
                "/api/extend",
                json!({"sessionId": session_id, "extendedMinutes": 5}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(extended["success"], true);
        assert_eq!(extended["newDuration"], 900);
        assert_eq!(extended["extendPeriod"], 300);
        assert_eq!(extended["sessionId"], session_id.as_str());
    }

    #[tokio::test]
    async fn test_duplicate_start_returns_conflict_with_first_id() {
        let app = app();

        let (_, first) = send(&app, post_json("/api/start", json!({"accessToken": "tok1"}))).await;
        let (status, second) =
            send(&app, post_json("/api/start", json!({"accessToken": "tok1"}))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(second["sessionId"], first["sessionId"]);
        assert!(second["error"].is_string());
    }

    #[tokio::test]
    async fn test_start_validation_errors() {
        let app = app();

        let (status, body) = send(&app, post_json("/api/start", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Access token required");

        let (status, _) = send(
            &app,
            post_json("/api/start", json!({"accessToken": "tok1", "duration": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request_with_details() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/start")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid input");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_validate_known_and_unknown_sessions() {
        let app = app();
        let (_, started) =
            send(&app, post_json("/api/start", json!({"accessToken": "tok1"}))).await;
        let session_id = started["sessionId"].as_str().unwrap();

        let (status, body) =
            send(&app, get_request(&format!("/api/validate?sessionId={session_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"valid": true}));

        let unknown = uuid::Uuid::new_v4();
        let (status, body) =
            send(&app, get_request(&format!("/api/validate?sessionId={unknown}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get_request("/api/validate")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_session_by_either_query_spelling() {
        let app = app();
        let (_, started) = send(
            &app,
            post_json("/api/start", json!({"accessToken": "tok1", "duration": 120})),
        )
        .await;

        for uri in [
            "/api/check-session?access_token=tok1",
            "/api/check-session?accessToken=tok1",
            "/api/start?accessToken=tok1",
        ] {
            let (status, body) = send(&app, get_request(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["session"]["sessionId"], started["sessionId"]);
            assert_eq!(body["session"]["isActive"], true);
            assert_eq!(body["session"]["duration"], 120);
        }

        let (status, body) = send(&app, get_request("/api/check-session?accessToken=other")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"session": null}));
    }

    #[tokio::test]
    async fn test_extend_unknown_session_is_not_found() {
        let body = json!({"sessionId": uuid::Uuid::new_v4(), "extendedMinutes": 5});
        let (status, _) = send(&app(), post_json("/api/extend", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deactivate_then_validate_is_not_found() {
        let app = app();
        let (_, started) =
            send(&app, post_json("/api/start", json!({"accessToken": "tok1"}))).await;
        let session_id = started["sessionId"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            post_json("/api/deactivate", json!({"sessionId": session_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) =
            send(&app, get_request(&format!("/api/validate?sessionId={session_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            post_json("/api/deactivate", json!({"sessionId": session_id})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gate_denial_is_bad_request_and_keeps_duration() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Valid": false}"#)
            .create_async()
            .await;
        let app = gated_app(format!("{}/hook", server.url()));

        let (_, started) = send(
            &app,
            post_json("/api/start", json!({"accessToken": "tok1", "duration": 600})),
        )
        .await;
        let session_id = started["sessionId"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            post_json(
                "/api/extend",
                json!({"sessionId": session_id, "memberId": "mem_1", "extendedMinutes": 5}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Extension request denied");

        let (_, checked) =
            send(&app, get_request(&format!("/api/check-session?sessionId={session_id}"))).await;
        assert_eq!(checked["session"]["duration"], 600);
    }

    #[tokio::test]
    async fn test_gate_outage_is_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;
        let app = gated_app(format!("{}/hook", server.url()));

        let (_, started) =
            send(&app, post_json("/api/start", json!({"accessToken": "tok1"}))).await;
        let (status, body) = send(
            &app,
            post_json(
                "/api/extend",
                json!({
                    "sessionId": started["sessionId"],
                    "memberId": "mem_1",
                    "extendedMinutes": 5
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process extension request");
    }
}
