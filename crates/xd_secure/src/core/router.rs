use crate::core::{Method, Request, Response};
use crate::error::WebError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process the request and return a response or error
    async fn handle(&self, req: Request) -> Result<Response, WebError>;
}

/// Route parameters captured by a match, e.g. `path` for `/{*path}`.
pub type Params = HashMap<String, String>;

pub struct Router {
    by_method: HashMap<Method, matchit::Router<Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            by_method: HashMap::new(),
        }
    }

    /// Register `handler` for `method` and `path`.
    ///
    /// Panics on a malformed or conflicting pattern; routes are fixed at startup.
    pub fn add<S: Into<String>>(&mut self, method: Method, path: S, handler: Arc<dyn Handler>) {
        let path = path.into();
        let r = self.by_method.entry(method).or_default();
        if let Err(e) = r.insert(path.clone(), handler) {
            panic!("invalid route {path}: {e}");
        }
    }

    pub fn get<S: Into<String>>(&mut self, path: S, handler: Arc<dyn Handler>) {
        self.add(Method::GET, path, handler)
    }

    pub fn post<S: Into<String>>(&mut self, path: S, handler: Arc<dyn Handler>) {
        self.add(Method::POST, path, handler)
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, Params)> {
        if let Some(found) = self.lookup(method, path) {
            return Some(found);
        }
        // HEAD behaves like GET without a body unless it has its own route
        if *method == Method::HEAD {
            return self.lookup(&Method::GET, path);
        }
        None
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, Params)> {
        let m = self.by_method.get(method)?.at(path).ok()?;
        let params = m
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some((Arc::clone(m.value), params))
    }

    /// Methods with a route matching `path`, sorted, for `Allow` headers.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .by_method
            .iter()
            .filter(|(_, r)| r.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if methods.contains(&Method::GET) {
            methods.push(Method::HEAD);
        }
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    struct EchoPath;

    #[async_trait]
    impl Handler for EchoPath {
        async fn handle(&self, req: Request) -> Result<Response, WebError> {
            let path = req.param("path").unwrap_or("<root>");
            Ok(Response::text(StatusCode::OK, path.to_string()))
        }
    }

    async fn body_of(h: Arc<dyn Handler>, req: Request) -> String {
        let res = h.handle(req).await.expect("handler success");
        String::from_utf8(res.body_bytes().unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn catch_all_captures_nested_path() {
        let mut r = Router::new();
        r.get("/{*path}", Arc::new(EchoPath));

        let (h, params) = r.find(&Method::GET, "/assets/app-icon-48.svg").expect("found");
        let req = Request::new(Method::GET, "/assets/app-icon-48.svg").with_params(params);
        assert_eq!(body_of(h, req).await, "assets/app-icon-48.svg");
    }

    #[tokio::test]
    async fn static_route_wins_over_catch_all() {
        let mut r = Router::new();
        r.get("/{*path}", Arc::new(EchoPath));
        r.get("/api/stats", Arc::new(EchoPath));

        let (h, params) = r.find(&Method::GET, "/api/stats").expect("found");
        assert!(params.is_empty());
        let req = Request::new(Method::GET, "/api/stats").with_params(params);
        assert_eq!(body_of(h, req).await, "<root>");
    }

    #[test]
    fn head_falls_back_to_get() {
        let mut r = Router::new();
        r.get("/", Arc::new(EchoPath));
        assert!(r.find(&Method::HEAD, "/").is_some());
        assert!(r.find(&Method::POST, "/").is_none());
    }

    #[test]
    fn allowed_methods_lists_every_match() {
        let mut r = Router::new();
        r.post("/generate", Arc::new(EchoPath));
        assert_eq!(r.allowed_methods("/generate"), vec![Method::POST]);

        r.get("/generate", Arc::new(EchoPath));
        assert_eq!(
            r.allowed_methods("/generate"),
            vec![Method::GET, Method::HEAD, Method::POST]
        );
        assert!(r.allowed_methods("/nope").is_empty());
    }
}
