//! Route-level content negotiation.
//!
//! Routes with both an HTML and an `ActivityPub` representation are
//! registered once; requests whose `Accept` header prefers HTML are handed to
//! the HTML router instead of the wrapped `ActivityPub` handler.

use std::convert::Infallible;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header},
    response::Response,
};
use futures::future::BoxFuture;
use tower::{Layer, ServiceExt};
use tracing::trace;

use crate::negotiation::wants_activity_pub;

/// Layer sending HTML-preferring requests to `html`.
#[derive(Clone)]
pub struct HtmlFallbackLayer {
    html: Router,
}

impl HtmlFallbackLayer {
    #[must_use]
    pub const fn new(html: Router) -> Self {
        Self { html }
    }
}

impl<S> Layer<S> for HtmlFallbackLayer {
    type Service = HtmlFallbackService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HtmlFallbackService {
            inner,
            html: self.html.clone(),
        }
    }
}

/// Service choosing between the wrapped handler and the HTML router.
#[derive(Clone)]
pub struct HtmlFallbackService<S> {
    inner: S,
    html: Router,
}

impl<S> tower::Service<Request<Body>> for HtmlFallbackService<S>
where
    S: tower::Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        tower::Service::poll_ready(&mut self.inner, cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let html = self.html.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = if wants_activity_pub(req.headers()) {
                tower::Service::call(&mut inner, req).await?
            } else {
                trace!(uri = %req.uri(), "Forwarding to HTML router");
                html.oneshot(req).await?
            };
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Accept"));
            Ok(response)
        })
    }
}
