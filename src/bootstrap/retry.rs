use std::future::Future;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::classify::DbError;
use super::coordinator::InitCoordinator;
use crate::error::{AppError, BootstrapError};
use crate::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_on_safe_methods: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on_safe_methods: true,
        }
    }
}

/// Implemented by handler errors that may carry a database failure.
pub trait InitFailure {
    fn db_error(&self) -> Option<&DbError>;

    fn is_missing_schema(&self) -> bool {
        self.db_error().is_some_and(DbError::is_missing_schema)
    }
}

impl InitFailure for DbError {
    fn db_error(&self) -> Option<&DbError> {
        Some(self)
    }
}

impl InitFailure for AppError {
    fn db_error(&self) -> Option<&DbError> {
        match self {
            AppError::Database(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum InitRetryError<E> {
    Handler(E),
    Bootstrap(BootstrapError),
    /// The database was just provisioned; the caller has to resend.
    RetryLater,
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Runs `handler`, bootstrapping the database when it fails for lack of schema.
///
/// Safe methods are replayed exactly once after a successful bootstrap. Unsafe
/// methods are never replayed; they get [`InitRetryError::RetryLater`].
pub async fn with_init_retry<T, E, F, Fut>(
    coordinator: &InitCoordinator,
    method: &Method,
    policy: RetryPolicy,
    mut handler: F,
) -> Result<T, InitRetryError<E>>
where
    E: InitFailure,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let err = match handler().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_missing_schema() => e,
        Err(e) => return Err(InitRetryError::Handler(e)),
    };

    if let Some(db) = err.db_error() {
        tracing::warn!(error = %db, %method, "Database not provisioned, bootstrapping");
    }

    coordinator
        .ensure_schema()
        .await
        .map_err(InitRetryError::Bootstrap)?;

    if policy.retry_on_safe_methods && is_safe_method(method) {
        return handler().await.map_err(InitRetryError::Handler);
    }
    Err(InitRetryError::RetryLater)
}

struct FailedResponse(Response);

impl InitFailure for FailedResponse {
    fn db_error(&self) -> Option<&DbError> {
        self.0.extensions().get::<DbError>()
    }
}

/// Method, URI, version, headers and extensions of a safe request, kept so it
/// can be sent down the stack a second time.
struct ReplayTemplate {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
}

impl ReplayTemplate {
    fn capture(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            extensions: parts.extensions.clone(),
        }
    }

    fn build(&self) -> Request {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = self.extensions.clone();
        request
    }
}

/// Middleware applying [`with_init_retry`] to a group of routes.
pub async fn with_db_init(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let (parts, body) = request.into_parts();

    // Only safe requests are ever replayed, and those carry no meaningful body.
    let template = is_safe_method(&method).then(|| ReplayTemplate::capture(&parts));
    let mut first = Some(Request::from_parts(parts, body));

    // `Next` is not `Sync`, so the closure owns it rather than borrowing it.
    let attempt = move || {
        let request = first
            .take()
            .or_else(|| template.as_ref().map(ReplayTemplate::build));
        let next = next.clone();
        async move {
            let Some(request) = request else {
                return Err(FailedResponse(
                    AppError::Internal("request cannot be replayed".to_string()).into_response(),
                ));
            };
            let response = next.run(request).await;
            if response.extensions().get::<DbError>().is_some() {
                Err(FailedResponse(response))
            } else {
                Ok(response)
            }
        }
    };

    match with_init_retry(&state.init, &method, state.config.retry_policy(), attempt).await {
        Ok(response) => response,
        Err(InitRetryError::Handler(FailedResponse(response))) => response,
        Err(InitRetryError::Bootstrap(e)) => AppError::Bootstrap(e).into_response(),
        Err(InitRetryError::RetryLater) => AppError::Initializing.into_response(),
    }
}
