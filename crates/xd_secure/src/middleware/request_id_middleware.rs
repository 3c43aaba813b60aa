use crate::core::{Handler, Request, Response};
use crate::error::WebError;
use crate::middleware::Middleware;
use crate::utils::request_id;
use http::HeaderValue;
use std::sync::Arc;

/// Ensures every request and response carries an `x-request-id`.
///
/// A well-formed id sent by the client is kept; otherwise a new one is minted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestId;

impl RequestId {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Middleware for RequestId {
    async fn handle(&self, mut req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
        let id = req
            .request_id()
            .filter(|id| request_id::is_acceptable(id))
            .map(str::to_string)
            .unwrap_or_else(request_id::generate);
        // ids are ASCII-checked or generated as hex, so always valid header values
        let value = HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("invalid"));

        req.headers_mut().insert(request_id::HEADER, value.clone());
        let mut res = next.handle(req).await?;
        res.headers.entry(request_id::HEADER).or_insert(value);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;
    use http::StatusCode;

    struct SeenId;

    #[async_trait::async_trait]
    impl Handler for SeenId {
        async fn handle(&self, req: Request) -> Result<Response, WebError> {
            let id = req.request_id().unwrap_or("").to_string();
            Ok(Response::text(StatusCode::OK, id))
        }
    }

    #[tokio::test]
    async fn mints_an_id_when_absent() {
        let res = RequestId::new()
            .handle(Request::new(Method::GET, "/"), Arc::new(SeenId))
            .await
            .unwrap();
        let header = res.headers.get(request_id::HEADER).unwrap().to_str().unwrap();
        assert!(!header.is_empty());
        assert_eq!(res.body_bytes().unwrap().as_ref(), header.as_bytes());
    }

    #[tokio::test]
    async fn keeps_a_client_id() {
        let req = Request::new(Method::GET, "/").header(request_id::HEADER, "client-42");
        let res = RequestId::new().handle(req, Arc::new(SeenId)).await.unwrap();
        assert_eq!(res.headers.get(request_id::HEADER).unwrap(), "client-42");
    }

    #[tokio::test]
    async fn replaces_a_malformed_client_id() {
        let req = Request::new(Method::GET, "/").header(request_id::HEADER, "a b");
        let res = RequestId::new().handle(req, Arc::new(SeenId)).await.unwrap();
        assert_ne!(res.headers.get(request_id::HEADER).unwrap(), "a b");
    }
}
