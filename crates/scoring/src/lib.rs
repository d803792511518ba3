//! Scoring service core: declarative request validation, digest
//! authentication, method dispatch, and the cache-backed scoring engine.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod requests;
pub mod scoring;
pub mod store;
pub mod telemetry;
pub mod validation;

pub use dispatch::{method_router, DispatchError, MethodDispatcher, RequestContext};
pub use error::AppError;
