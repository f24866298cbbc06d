//! Request correlation and the HTTP trace layer.

use std::{cell::RefCell, fmt};

use axum::http::Request;
use futures::Future;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use uuid::Uuid;

use crate::middleware_helpers::request_id::REQUEST_ID_HEADER;

/// Correlation id of one HTTP request, echoed in `x-request-id` and error bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static REQUEST_SCOPE: RefCell<Option<RequestId>>;
}

/// Makes `request_id` available to [`current_request_id`] while `future` runs.
pub async fn scope_request_id<F: Future>(request_id: RequestId, future: F) -> F::Output {
    REQUEST_SCOPE.scope(RefCell::new(Some(request_id)), future).await
}

/// `None` outside a request scope.
pub fn current_request_id() -> Option<RequestId> {
    REQUEST_SCOPE
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// One `http` span per request, tagged with its request id.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_owned())
            .or_else(|| {
                request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http",
            %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    DefaultOnResponse,
>;

/// Logs each response with status and latency; only 5xx count as failures.
pub fn configure_http_tracing() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}
