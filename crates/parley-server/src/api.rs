//! HTTP boundary for the chat backend.
//!
//! Handlers hold no state of their own; they receive the registry and log
//! handles through [`AppState`] and translate core results into status codes
//! per [`crate::error::ApiError`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, Method},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use parley_core::{Message, MessageLog, Presence, Session, SessionRegistry};

use crate::config::ServerConfig;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub log: MessageLog,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", delete(logout))
        .route("/users", get(list_users))
        .route("/users/{username}", get(get_user))
        .route("/messages", get(get_messages).post(post_message))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
}

#[derive(Deserialize)]
struct PostMessageRequest {
    message: String,
}

/// Query params arrive as raw strings so that unparseable values fall back
/// to the defaults instead of rejecting the request (original behavior).
#[derive(Deserialize, Default)]
struct PageQuery {
    count: Option<String>,
    offset: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Pull the session token out of the `Authorization` header. The raw token
/// value is accepted as-is; a `Bearer ` prefix is tolerated and stripped.
fn bearer_token(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized)?;
    let raw = value.to_str().map_err(|_| ApiError::Forbidden)?;
    let raw = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

    // A token that is not even a UUID cannot be in the registry.
    Uuid::parse_str(raw).map_err(|_| ApiError::Forbidden)
}

/// Resolve the acting user for a protected request: 401 when no token is
/// presented, 403 when the token is unknown. On success the session's
/// activity time and online flag are refreshed BEFORE the requested action
/// runs, so activity is recorded even if that action later fails.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = bearer_token(headers)?;

    if !state.registry.token_exists(token).await {
        return Err(ApiError::Forbidden);
    }

    state.registry.touch(token).await;
    state.registry.set_presence(token, Presence::Online).await;

    state.registry.get(token).await.map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    let session = state.registry.create(&req.username).await?;

    info!(username = %session.username, "User logged in");
    Ok(Json(session))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Session>, ApiError> {
    let token = bearer_token(&headers)?;
    if !state.registry.token_exists(token).await {
        return Err(ApiError::Forbidden);
    }

    let removed = state.registry.remove(token).await?;

    info!(username = %removed.username, "User logged out");
    Ok(Json(removed))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Session>>, ApiError> {
    authenticate(&state, &headers).await?;
    Ok(Json(state.registry.list_online().await))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Session>, ApiError> {
    authenticate(&state, &headers).await?;

    let session = state.registry.get_by_username(&username).await?;
    Ok(Json(session))
}

async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    authenticate(&state, &headers).await?;

    let count = query
        .count
        .and_then(|v| v.parse().ok())
        .unwrap_or(parley_core::messages::DEFAULT_PAGE_SIZE);
    let offset = query.offset.and_then(|v| v.parse().ok()).unwrap_or(0);

    Ok(Json(state.log.page(count, offset).await))
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let session = authenticate(&state, &headers).await?;
    let Json(req) = payload.map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    let message = state.log.append(&req.message, &session.username).await;

    info!(id = message.id, author = %message.author, "Message posted");
    Ok(Json(message))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            registry: SessionRegistry::new(),
            log: MessageLog::new(),
            config: Arc::new(ServerConfig::default()),
        }
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn auth_request(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap()
    }

    async fn login(state: &AppState, username: &str) -> String {
        let (status, body) =
            send(state, json_request("POST", "/login", json!({ "username": username }))).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_login_returns_session() {
        let state = test_state();
        let (status, body) =
            send(&state, json_request("POST", "/login", json!({ "username": "alice" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["online"], true);
        assert!(body.get("lastSeen").is_some());
        assert!(body["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_login_empty_username_is_400() {
        let state = test_state();
        let (status, body) =
            send(&state, json_request("POST", "/login", json!({ "username": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_login_duplicate_username_is_401() {
        let state = test_state();
        login(&state, "alice").await;

        let (status, body) =
            send(&state, json_request("POST", "/login", json!({ "username": "alice" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "username is already in use");
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_400() {
        let state = test_state();
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let state = test_state();
        let request = Request::builder().uri("/users").body(Body::empty()).unwrap();
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token_is_403() {
        let state = test_state();
        let (status, _) =
            send(&state, auth_request("GET", "/users", &Uuid::new_v4().to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Not even UUID-shaped: still 403, a token WAS presented.
        let (status, _) = send(&state, auth_request("GET", "/users", "garbage")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bearer_prefix_tolerated() {
        let state = test_state();
        let token = login(&state, "alice").await;

        let (status, _) =
            send(&state, auth_request("GET", "/users", &format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let state = test_state();
        let token = login(&state, "alice").await;

        let (status, body) = send(&state, auth_request("DELETE", "/logout", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        let (status, _) = send(&state, auth_request("DELETE", "/logout", &token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Username is available again after logout.
        login(&state, "alice").await;
    }

    #[tokio::test]
    async fn test_list_users_shows_online_only() {
        let state = test_state();
        let alice = login(&state, "alice").await;
        let bob = login(&state, "bob").await;

        state
            .registry
            .set_presence(bob.parse().unwrap(), Presence::Offline)
            .await;

        let (status, body) = send(&state, auth_request("GET", "/users", &alice)).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "alice");
    }

    #[tokio::test]
    async fn test_get_user_by_username() {
        let state = test_state();
        let token = login(&state, "alice").await;

        let (status, body) = send(&state, auth_request("GET", "/users/alice", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        let (status, _) = send(&state, auth_request("GET", "/users/nobody", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_and_page_messages() {
        let state = test_state();
        let token = login(&state, "alice").await;

        for body in ["a", "b", "c"] {
            let mut request = json_request("POST", "/messages", json!({ "message": body }));
            request
                .headers_mut()
                .insert(header::AUTHORIZATION, token.parse().unwrap());
            let (status, posted) = send(&state, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(posted["author"], "alice");
        }

        let (status, body) =
            send(&state, auth_request("GET", "/messages?count=3&offset=0", &token)).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 3);
        for (i, expected) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(messages[i]["id"], i as u64);
            assert_eq!(messages[i]["message"], *expected);
        }
    }

    #[tokio::test]
    async fn test_unparseable_page_params_fall_back_to_defaults() {
        let state = test_state();
        let token = login(&state, "alice").await;

        let mut request = json_request("POST", "/messages", json!({ "message": "hi" }));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, token.parse().unwrap());
        send(&state, request).await;

        let (status, body) = send(
            &state,
            auth_request("GET", "/messages?count=lots&offset=some", &token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_posting_refreshes_activity() {
        let state = test_state();
        let token = login(&state, "alice").await;
        let uuid: Uuid = token.parse().unwrap();

        state.registry.set_presence(uuid, Presence::Offline).await;

        let mut request = json_request("POST", "/messages", json!({ "message": "back" }));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, token.parse().unwrap());
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);

        // The auth step re-marked the session online before appending.
        assert_eq!(
            state.registry.get(uuid).await.unwrap().presence,
            Presence::Online
        );
    }
}
