use async_trait::async_trait;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
};
use http::{HeaderValue, StatusCode};
use std::sync::Arc;

use super::Middleware;
use crate::core::{Handler, Method, Request, Response};
use crate::error::WebError;

const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

/// Permissive CORS: any origin may call the API.
///
/// Preflight requests are answered here without reaching the router.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorsMiddleware;

impl CorsMiddleware {
    pub fn new() -> Self {
        Self
    }

    fn is_preflight(req: &Request) -> bool {
        *req.method() == Method::OPTIONS
            && req.headers().contains_key(ORIGIN)
            && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
        let any_origin = HeaderValue::from_static("*");

        if Self::is_preflight(&req) {
            let mut res = Response::empty(StatusCode::NO_CONTENT);
            res.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, any_origin);
            res.headers
                .insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
            if let Some(requested) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
                res.headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
            return Ok(res);
        }

        let cross_origin = req.headers().contains_key(ORIGIN);
        let mut res = next.handle(req).await?;
        if cross_origin {
            res.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, any_origin);
        }
        Ok(res)
    }
}
