use crate::core::{Handler, Request, Response};
use crate::error::WebError;
use crate::middleware::Middleware;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, info};

/// Opens a span per request so every event logged while handling it carries
/// the request id, method and path; records status and latency on completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
        let span = tracing::info_span!(
            "request",
            request_id = req.request_id().unwrap_or(""),
            method = %req.method(),
            path = req.path(),
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );
        let recorder = span.clone();

        async move {
            let started = std::time::Instant::now();
            let result = next.handle(req).await;

            let status = match &result {
                Ok(res) => res.status,
                Err(e) => e.status_code(),
            };
            recorder.record("status", status.as_u16());
            recorder.record("latency_ms", started.elapsed().as_millis() as u64);
            info!("request completed");

            result
        }
        .instrument(span)
        .await
    }
}
