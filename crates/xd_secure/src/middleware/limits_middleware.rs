use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::Middleware;
use crate::config::Config;
use crate::core::{Handler, Request, Response};
use crate::error::{SimpleError, WebError};

/// Request size and time limits.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub max_path_length: usize,
    pub max_headers: usize,
    /// Name plus value, per header.
    pub max_header_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
            max_path_length: 2048,
            max_headers: 100,
            max_header_size: 8 * 1024,
        }
    }
}

impl LimitsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .request_timeout(config.request_timeout())
            .max_body_size(config.max_body_bytes)
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn max_path_length(mut self, length: usize) -> Self {
        self.max_path_length = length;
        self
    }

    pub fn max_headers(mut self, count: usize) -> Self {
        self.max_headers = count;
        self
    }

    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }
}

/// Rejects oversized requests and bounds handler time.
#[derive(Debug, Clone, Default)]
pub struct LimitsMiddleware {
    config: LimitsConfig,
}

impl LimitsMiddleware {
    pub fn with_config(config: LimitsConfig) -> Self {
        Self { config }
    }

    fn check(&self, req: &Request) -> Result<(), SimpleError> {
        let reject = |status: StatusCode, what: String| {
            tracing::warn!(limit = %what, "request rejected by limits");
            Err(SimpleError::new(
                status,
                status.canonical_reason().unwrap_or("Bad Request").to_string(),
            ))
        };

        if req.path().len() > self.config.max_path_length {
            return reject(
                StatusCode::URI_TOO_LONG,
                format!("path {} > {}", req.path().len(), self.config.max_path_length),
            );
        }
        if req.headers().len() > self.config.max_headers {
            return reject(
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                format!("headers {} > {}", req.headers().len(), self.config.max_headers),
            );
        }
        if let Some((name, value)) = req
            .headers()
            .iter()
            .find(|(n, v)| n.as_str().len() + v.len() > self.config.max_header_size)
        {
            return reject(
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                format!("header {} is {} bytes", name.as_str(), name.as_str().len() + value.len()),
            );
        }
        if req.body().len() > self.config.max_body_size {
            return reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("body {} > {}", req.body().len(), self.config.max_body_size),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware for LimitsMiddleware {
    async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
        if let Err(e) = self.check(&req) {
            return Ok(WebError::from(e).into_response());
        }

        match timeout(self.config.request_timeout, next.handle(req)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "request timed out"
                );
                let err = SimpleError::new(StatusCode::REQUEST_TIMEOUT, "Request Timeout".to_string());
                Ok(WebError::from(err).into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;

    struct Slow(Option<Duration>);

    #[async_trait]
    impl Handler for Slow {
        async fn handle(&self, _req: Request) -> Result<Response, WebError> {
            if let Some(delay) = self.0 {
                tokio::time::sleep(delay).await;
            }
            Ok(Response::text(StatusCode::OK, "ok"))
        }
    }

    async fn status(config: LimitsConfig, req: Request, delay: Option<Duration>) -> u16 {
        LimitsMiddleware::with_config(config)
            .handle(req, Arc::new(Slow(delay)))
            .await
            .unwrap()
            .status
            .as_u16()
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let config = LimitsConfig::new().request_timeout(Duration::from_millis(50));
        let req = Request::new(Method::POST, "/generate");
        assert_eq!(status(config, req, Some(Duration::from_millis(500))).await, 408);
    }

    #[tokio::test]
    async fn long_path_is_rejected() {
        let config = LimitsConfig::new().max_path_length(10);
        let req = Request::new(Method::GET, "/assets/app-icon-512.svg");
        assert_eq!(status(config, req, None).await, 414);
    }

    #[tokio::test]
    async fn large_body_is_rejected() {
        let config = LimitsConfig::new().max_body_size(8);
        let req = Request::new(Method::POST, "/generate").with_body(r#"{"length": 20}"#);
        assert_eq!(status(config, req, None).await, 413);
    }

    #[tokio::test]
    async fn header_limits() {
        let req = Request::new(Method::GET, "/")
            .header("h1", "v")
            .header("h2", "v")
            .header("h3", "v");
        assert_eq!(status(LimitsConfig::new().max_headers(2), req, None).await, 431);

        let req = Request::new(Method::GET, "/").header("x-long", "very-long-value");
        assert_eq!(status(LimitsConfig::new().max_header_size(10), req, None).await, 431);
    }

    #[tokio::test]
    async fn config_feeds_limits() {
        let config = Config {
            max_body_bytes: 4,
            ..Config::default()
        };
        let limits = LimitsConfig::from_config(&config);
        assert_eq!(limits.request_timeout, Duration::from_secs(30));
        let req = Request::new(Method::POST, "/generate").with_body("{}");
        assert_eq!(status(limits, req, None).await, 200);
    }
}
