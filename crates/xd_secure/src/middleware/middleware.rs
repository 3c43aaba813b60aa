use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{Handler, Request, Response};
use crate::error::WebError;

/// A layer around the route handler that may inspect or replace the
/// request and response, or answer without calling `next`.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError>;
}

struct Layer {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Layer {
    async fn handle(&self, req: Request) -> Result<Response, WebError> {
        self.middleware.handle(req, Arc::clone(&self.next)).await
    }
}

/// Wrap `handler` in `middlewares`; the first registered middleware is outermost.
pub fn compose(middlewares: &[Arc<dyn Middleware>], handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| -> Arc<dyn Handler> {
            Arc::new(Layer {
                middleware: Arc::clone(middleware),
                next,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;
    use http::StatusCode;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: Request, next: Arc<dyn Handler>) -> Result<Response, WebError> {
            let mut res = next.handle(req).await?;
            let seen = res
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            res.set_header("x-trace", format!("{seen}{}", self.0));
            Ok(res)
        }
    }

    struct Ok200;

    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _req: Request) -> Result<Response, WebError> {
            Ok(Response::empty(StatusCode::OK))
        }
    }

    #[tokio::test]
    async fn first_registered_runs_outermost() {
        let layers: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("A>")), Arc::new(Tag("B>"))];
        let chain = compose(&layers, Arc::new(Ok200));
        let res = chain.handle(Request::new(Method::GET, "/")).await.unwrap();
        // B is innermost, so it sees the response first
        assert_eq!(res.headers.get("x-trace").unwrap(), "B>A>");
    }
}
