//! HTTP boundary: a catch-all gateway route plus the nested admin surface.
//!
//! Every inbound method/path is normalized into a `RequestDescriptor` and
//! handed to the orchestrator; the response maps 1:1 onto the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use praetor_core::types::RequestDescriptor;

use crate::admin;
use crate::orchestrator::Gateway;

/// Upper bound on buffered request bodies.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub admin_token: Option<String>,
}

pub struct ServerConfig {
    pub addr: SocketAddr,
    pub admin_token: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/admin", admin::routes(state.clone()))
        .fallback(handle_gateway)
        .layer(cors)
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

async fn handle_gateway(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let token = bearer_token(&parts.headers);

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "failed to buffer request body");
            Default::default()
        }
    };
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    let descriptor = RequestDescriptor::new(method, path, payload).with_uri(uri);
    let response = state.gateway.handle(token.as_deref(), descriptor).await;

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

/// Start the gateway server. Long-running future; call from `#[tokio::main]`.
pub async fn serve(gateway: Arc<Gateway>, config: ServerConfig) -> std::io::Result<()> {
    let state = AppState {
        gateway,
        admin_token: config.admin_token,
    };
    let app = build_router(state);

    info!(addr = %config.addr, "praetor gateway listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
