use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::Middleware;
use crate::core::{Handler, Request, Response};
use crate::error::{WebError, internal_error};

/// Turns a panicking handler into a 500 instead of a dropped connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicRecoveryMiddleware;

impl PanicRecoveryMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for PanicRecoveryMiddleware {
    async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
        match AssertUnwindSafe(next.handle(req)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(panic = %msg, "handler panicked");
                Ok(internal_error("Internal Server Error").into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;
    use http::StatusCode;

    struct Panics;

    #[async_trait]
    impl Handler for Panics {
        async fn handle(&self, _req: Request) -> Result<Response, WebError> {
            panic!("counter exploded");
        }
    }

    struct Fine;

    #[async_trait]
    impl Handler for Fine {
        async fn handle(&self, _req: Request) -> Result<Response, WebError> {
            Ok(Response::text(StatusCode::OK, "ok"))
        }
    }

    #[tokio::test]
    async fn panic_becomes_500() {
        let res = PanicRecoveryMiddleware::new()
            .handle(Request::new(Method::GET, "/"), Arc::new(Panics))
            .await
            .unwrap();
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn normal_request_passes_through() {
        let res = PanicRecoveryMiddleware::new()
            .handle(Request::new(Method::GET, "/"), Arc::new(Fine))
            .await
            .unwrap();
        assert_eq!(res.status, StatusCode::OK);
    }
}
