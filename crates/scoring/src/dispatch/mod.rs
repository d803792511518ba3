//! Method dispatch: envelope validation, the authentication gate, and routing
//! to the `online_score` / `clients_interests` handlers.

mod router;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::auth::Authenticator;
use crate::requests::{ClientsInterestsRequest, MethodRequest, OnlineScoreRequest, RequestSchema};
use crate::scoring::{get_interests, get_score};
use crate::store::{Store, StoreError};
use crate::validation::ValidationError;

pub use router::{method_router, not_found};

/// Score returned to admin callers without running the scoring engine.
pub const ADMIN_SCORE: i64 = 42;

pub const ONLINE_SCORE: &str = "online_score";
pub const CLIENTS_INTERESTS: &str = "clients_interests";

/// Per-call bookkeeping used for logging only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    pub request_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub has: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nclients: Option<usize>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Bad Request")]
    BadRequest,
    #[error("Forbidden")]
    Forbidden,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::BadRequest => StatusCode::BAD_REQUEST,
            DispatchError::Forbidden => StatusCode::FORBIDDEN,
            DispatchError::Invalid(_) | DispatchError::UnknownMethod(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller; store details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::Store(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Validates, authenticates, and executes method calls against the store.
pub struct MethodDispatcher {
    store: Store,
    auth: Authenticator,
}

impl MethodDispatcher {
    pub fn new(store: Store, auth: Authenticator) -> Self {
        Self { store, auth }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn handle(
        &self,
        body: &Value,
        ctx: &mut RequestContext,
    ) -> Result<Value, DispatchError> {
        let request = match MethodRequest::from_value(body) {
            Ok(request) => request,
            Err(err) if err.is_missing("token") => {
                info!("request carries no token");
                return Err(DispatchError::Forbidden);
            }
            Err(err) => {
                info!(error = %err, "method request rejected");
                return Err(err.into());
            }
        };

        if !self.auth.check(&request) {
            return Err(DispatchError::Forbidden);
        }

        info!(method = ?request.method, "dispatching method");
        match request.method.as_deref() {
            Some(ONLINE_SCORE) => self.online_score(&request, ctx).await,
            Some(CLIENTS_INTERESTS) => self.clients_interests(&request, ctx).await,
            other => {
                info!(method = ?other, "unavailable method");
                Err(DispatchError::UnknownMethod(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }
    }

    async fn online_score(
        &self,
        request: &MethodRequest,
        ctx: &mut RequestContext,
    ) -> Result<Value, DispatchError> {
        let arguments = request.arguments();
        let score_request = OnlineScoreRequest::from_value(&arguments)?;
        ctx.has = supplied_fields(request.arguments.as_ref());

        if request.is_admin() {
            info!(score = ADMIN_SCORE, "admin score ready");
            return Ok(json!({ "score": ADMIN_SCORE }));
        }

        let score = get_score(&self.store, &score_request).await;
        info!(score, "online score ready");
        Ok(json!({ "score": score }))
    }

    async fn clients_interests(
        &self,
        request: &MethodRequest,
        ctx: &mut RequestContext,
    ) -> Result<Value, DispatchError> {
        let arguments = request.arguments();
        let interests_request = ClientsInterestsRequest::from_value(&arguments)?;
        ctx.nclients = Some(interests_request.client_ids.len());

        let mut interests = Map::new();
        for client_id in &interests_request.client_ids {
            let list = get_interests(&self.store, *client_id).await?;
            interests.insert(client_id.to_string(), json!(list));
        }
        info!(clients = interests.len(), "client interests ready");
        Ok(Value::Object(interests))
    }
}

fn supplied_fields(arguments: Option<&Map<String, Value>>) -> Vec<String> {
    arguments
        .map(|arguments| {
            arguments
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, _)| key.clone())
                .collect()
        })
        .unwrap_or_default()
}
