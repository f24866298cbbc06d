use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::tracing::{scope_request_id, RequestId};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longer client-supplied ids are replaced with a generated one.
const MAX_CLIENT_ID_LEN: usize = 128;

fn client_request_id(request: &Request) -> Option<RequestId> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_CLIENT_ID_LEN)
        .map(RequestId::new)
}

/// Tags the request with an id (the client's, or a fresh UUID), runs the rest
/// of the stack inside that id's scope and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = client_request_id(&request).unwrap_or_else(RequestId::generate);
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let header_value = HeaderValue::from_str(request_id.as_str()).ok();

    if let Some(value) = &header_value {
        request.headers_mut().insert(header_name.clone(), value.clone());
    }
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::debug_span!("request_id", id = %request_id);
    let mut response = scope_request_id(request_id, next.run(request).instrument(span)).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(header_name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request as HttpRequest,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn echo(Extension(request_id): Extension<RequestId>) -> String {
        let scoped = crate::tracing::current_request_id().map(|id| id.to_string());
        format!("{}|{}", request_id, scoped.unwrap_or_default())
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    async fn call(header: Option<&str>) -> (Option<String>, String) {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID_HEADER, value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let echoed = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (echoed, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn generates_an_id_when_the_client_sends_none() {
        let (echoed, body) = call(None).await;
        let id = echoed.expect("response header");
        assert_eq!(body, format!("{}|{}", id, id));
    }

    #[tokio::test]
    async fn keeps_the_client_id() {
        let (echoed, body) = call(Some("route-2026-10-20")).await;
        assert_eq!(echoed.as_deref(), Some("route-2026-10-20"));
        assert_eq!(body, "route-2026-10-20|route-2026-10-20");
    }

    #[tokio::test]
    async fn replaces_oversized_client_ids() {
        let long = "x".repeat(MAX_CLIENT_ID_LEN + 1);
        let (echoed, _) = call(Some(&long)).await;
        let id = echoed.expect("response header");
        assert_ne!(id, long);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
