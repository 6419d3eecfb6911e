// src/server/handler.rs
use crate::health::{CheckContext, HealthChecker};
use crate::metrics::MetricsRegistry;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;

/// Serves the composite health payload and, optionally, Prometheus metrics.
#[derive(Clone)]
pub struct HealthHandler {
    checker: Arc<HealthChecker>,
    health_path: Arc<str>,
    request_timeout: Duration,
    metrics: Option<(Arc<str>, Arc<MetricsRegistry>)>,
}

impl HealthHandler {
    pub fn new(checker: Arc<HealthChecker>, health_path: &str, request_timeout: Duration) -> Self {
        Self {
            checker,
            health_path: health_path.into(),
            request_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, path: &str, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some((path.into(), registry));
        self
    }

    async fn handle(self, req: Request<Body>) -> Response<Body> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        let path = req.uri().path();
        if path == &*self.health_path {
            return self.health().await;
        }
        if let Some((metrics_path, registry)) = &self.metrics {
            if path == &**metrics_path {
                return match registry.gather() {
                    Ok(body) => response(StatusCode::OK, "text/plain; version=0.0.4", body),
                    Err(e) => {
                        tracing::error!("Failed to encode metrics: {}", e);
                        plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    }
                };
            }
        }

        plain(StatusCode::NOT_FOUND, "Not Found")
    }

    async fn health(&self) -> Response<Body> {
        let ctx = CheckContext::with_timeout(self.request_timeout);
        let health = self.checker.health(&ctx).await;

        let status = if health.is_up() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        match serde_json::to_vec(&*health) {
            Ok(body) => response(status, "application/json", body),
            Err(e) => {
                tracing::error!("Failed to encode health status: {}", e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl Service<Request<Body>> for HealthHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}

fn response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    response
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    response(status, "text/plain", message.as_bytes().to_vec())
}
