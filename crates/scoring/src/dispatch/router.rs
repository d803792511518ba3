use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info};

use super::{DispatchError, MethodDispatcher, RequestContext};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Router exposing the method endpoint; unknown paths get the 404 envelope.
pub fn method_router(dispatcher: Arc<MethodDispatcher>) -> Router {
    Router::new()
        .route("/method", post(method_handler))
        .route("/method/", post(method_handler))
        .fallback(not_found)
        .with_state(dispatcher)
}

pub(crate) async fn method_handler(
    State(dispatcher): State<Arc<MethodDispatcher>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = RequestContext::new(request_id(&headers));
    info!(request_id = %ctx.request_id, "new request");

    let result = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => dispatcher.handle(&payload, &mut ctx).await,
        Err(err) => {
            info!(request_id = %ctx.request_id, error = %err, "malformed request body");
            Err(DispatchError::BadRequest)
        }
    };

    let (status, envelope) = match result {
        Ok(response) => (
            StatusCode::OK,
            json!({ "response": response, "code": StatusCode::OK.as_u16() }),
        ),
        Err(err) => {
            let status = err.status();
            if let DispatchError::Store(source) = &err {
                error!(request_id = %ctx.request_id, error = %source, "unexpected error");
            }
            (
                status,
                json!({ "error": err.public_message(), "code": status.as_u16() }),
            )
        }
    };

    let context = serde_json::to_string(&ctx).unwrap_or_default();
    info!(code = status.as_u16(), %context, "request handled");
    (status, Json(envelope)).into_response()
}

/// Envelope for any path outside the method endpoint.
pub async fn not_found() -> Response {
    let status = StatusCode::NOT_FOUND;
    (
        status,
        Json(json!({ "error": "Not Found", "code": status.as_u16() })),
    )
        .into_response()
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}
