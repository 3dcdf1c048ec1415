use crate::auth::{check_bearer, require_bearer};
use crate::config::ResolvedConfig;
use crate::error::BridgeError;
use crate::logging::SharedJournal;
use crate::models::list_models;
use crate::proxy;
use crate::translate::types::{ChatRequest, ErrorResponse};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Clone)]
pub struct AppState {
    pub config: ResolvedConfig,
    pub client: reqwest::Client,
    pub journal: SharedJournal,
}

/// Build the router. `/health` is open; every other path, including unknown
/// ones, sits behind the bearer check. A known path hit with the wrong method
/// is answered like an unknown path.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/v1/models", get(handle_models).fallback(handle_not_found))
        .route(
            "/v1/chat/completions",
            post(handle_chat_completions).fallback(handle_not_found),
        )
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(handle_health).fallback(handle_not_found))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .journal
                .error("server", format!("Failed to parse request: {}", e));
            let err = ErrorResponse::upstream_failure(
                format!("Invalid request body: {}", e),
                StatusCode::BAD_REQUEST.as_u16(),
            );
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let is_streaming = req.stream.unwrap_or(false);

    state.journal.info(
        "server",
        format!(
            "Request: model={} streaming={} messages={}",
            req.model,
            is_streaming,
            req.messages.len()
        ),
    );

    if is_streaming {
        handle_streaming(state, &req).await
    } else {
        handle_non_streaming(state, &req).await
    }
}

async fn handle_non_streaming(state: Arc<AppState>, req: &ChatRequest) -> Response {
    match proxy::proxy_completion(req, &state.config, &state.client, &state.journal).await {
        Ok(completion) => Json(completion).into_response(),
        Err(e) => failure_response(&state, &e),
    }
}

async fn handle_streaming(state: Arc<AppState>, req: &ChatRequest) -> Response {
    let stream = match proxy::proxy_stream(req, &state.config, &state.client, &state.journal).await
    {
        Ok(s) => s,
        Err(e) => return failure_response(&state, &e),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Report a failed chat completion: the upstream's status when there was
/// one, 500 otherwise.
fn failure_response(state: &AppState, err: &BridgeError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    tracing::warn!(status = status.as_u16(), error = %err, "chat completion failed");
    state
        .journal
        .error("server", format!("Chat completion failed ({}): {}", status.as_u16(), err));

    let body = ErrorResponse::upstream_failure(err.client_message(), status.as_u16());
    (status, Json(body)).into_response()
}

async fn handle_health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": check_bearer(&headers, &state.config.secret).is_ok(),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Response {
    Json(list_models(state.config.models.as_slice())).into_response()
}

async fn handle_not_found(uri: Uri) -> Response {
    let err = ErrorResponse::invalid_request(format!("Unknown route: {}", uri.path()));
    (StatusCode::NOT_FOUND, Json(err)).into_response()
}
