//! Request identification.
//!
//! # Responsibilities
//! - Ensure every request carries an `x-request-id` (UUID v4 when absent)
//! - Make the ID reachable from handlers and logs via an extension

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request};
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request extension holding the correlation ID.
#[derive(Debug, Clone)]
pub struct RequestId(pub Arc<str>);

/// Convenience accessor for the correlation ID extension.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions().get::<RequestId>().map(|id| id.0.as_ref())
    }
}

/// Layer stamping each request with a correlation ID as early as possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let existing = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let id = match existing {
            Some(id) => id,
            None => {
                let generated = Uuid::new_v4().to_string();
                let value = HeaderValue::from_str(&generated)
                    .expect("UUID is always a valid header value");
                req.headers_mut().insert(X_REQUEST_ID, value);
                generated
            }
        };
        req.extensions_mut().insert(RequestId(Arc::from(id)));

        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::{service_fn, ServiceExt};

    async fn echo_id(req: Request<Body>) -> Result<(Option<String>, Option<String>), ()> {
        let header = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let extension = req.request_id().map(str::to_owned);
        Ok((header, extension))
    }

    #[tokio::test]
    async fn test_generates_id_when_absent() {
        let service = RequestIdLayer.layer(service_fn(echo_id));
        let req = Request::builder().body(Body::empty()).unwrap();

        let (header, extension) = service.oneshot(req).await.unwrap();
        let header = header.expect("header must be set");
        assert_eq!(Some(header.clone()), extension);
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[tokio::test]
    async fn test_preserves_existing_id() {
        let service = RequestIdLayer.layer(service_fn(echo_id));
        let req = Request::builder()
            .header(X_REQUEST_ID, "upstream-id-7")
            .body(Body::empty())
            .unwrap();

        let (header, extension) = service.oneshot(req).await.unwrap();
        assert_eq!(header.as_deref(), Some("upstream-id-7"));
        assert_eq!(extension.as_deref(), Some("upstream-id-7"));
    }
}
