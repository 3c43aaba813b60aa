pub mod config;
pub mod core;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod stats;
pub mod utils;

pub use config::Config;
pub use core::*;
pub use http::StatusCode;
pub use middleware::*;

use async_trait::async_trait;
use error::WebError;
use futures::StreamExt;
use http::Response as HttpResponse;
use pingora::protocols::http::ServerSession;
use pingora::server::ShutdownWatch;
use pingora::services::listening::Service;
use pingora_core::apps::{HttpPersistentSettings, HttpServerApp, HttpServerOptions, ReusedHttpStream};
use pingora_http::ResponseHeader;
use std::sync::Arc;

/// Routes plus the middleware stack wrapped around every request.
pub struct App {
    router: Router,
    middlewares: Vec<Arc<dyn Middleware>>,
    max_body_bytes: usize,
}

/// Collects a request body, keeping at most one byte past `limit` so the
/// limits middleware still sees the overflow.
struct BodyBuffer {
    limit: usize,
    bytes: bytes::BytesMut,
}

impl BodyBuffer {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            bytes: bytes::BytesMut::new(),
        }
    }

    /// Append a chunk; returns `false` once the body is over the limit.
    fn push(&mut self, chunk: &[u8]) -> bool {
        let room = self.limit.saturating_add(1).saturating_sub(self.bytes.len());
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
        !self.overflowed()
    }

    fn overflowed(&self) -> bool {
        self.bytes.len() > self.limit
    }

    fn freeze(self) -> bytes::Bytes {
        self.bytes.freeze()
    }
}

/// Answers requests no route matched.
enum Unrouted {
    NotFound,
    MethodNotAllowed(Vec<Method>),
    Options(Vec<Method>),
}

impl Unrouted {
    fn allow_header(methods: &[Method]) -> String {
        methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl Handler for Unrouted {
    async fn handle(&self, _req: Request) -> Result<Response, WebError> {
        Ok(match self {
            Unrouted::NotFound => Response::text(StatusCode::NOT_FOUND, "Not Found"),
            Unrouted::MethodNotAllowed(allowed) => {
                Response::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
                    .header(http::header::ALLOW, Self::allow_header(allowed))
            }
            Unrouted::Options(allowed) => Response::empty(StatusCode::NO_CONTENT)
                .header(http::header::ALLOW, Self::allow_header(allowed)),
        })
    }
}

/// Renders a route handler's error so the middlewares see a plain response.
struct Rendered(Arc<dyn Handler>);

#[async_trait]
impl Handler for Rendered {
    async fn handle(&self, req: Request) -> Result<Response, WebError> {
        Ok(self.0.handle(req).await.unwrap_or_else(WebError::into_response))
    }
}

impl App {
    /// Installs [`RequestId`] as the outermost middleware.
    pub fn new(router: Router) -> Self {
        let mut app = Self {
            router,
            middlewares: Vec::new(),
            max_body_bytes: LimitsConfig::default().max_body_size,
        };
        app.use_middleware(RequestId::new());
        app
    }

    /// Stop buffering a request body after this many bytes.
    pub fn max_body_bytes(&mut self, limit: usize) {
        self.max_body_bytes = limit;
    }

    /// Add a middleware inside the ones already registered.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    fn route(&self, req: &Request) -> (Arc<dyn Handler>, Params) {
        let (method, path) = (req.method(), req.path());
        if let Some(found) = self.router.find(method, path) {
            return found;
        }

        let mut allowed = self.router.allowed_methods(path);
        let fallback = if *method == Method::OPTIONS {
            allowed.push(Method::OPTIONS);
            Unrouted::Options(allowed)
        } else if allowed.is_empty() {
            Unrouted::NotFound
        } else {
            Unrouted::MethodNotAllowed(allowed)
        };
        (Arc::new(fallback), Params::new())
    }

    /// Run a request through the middlewares and the matched route.
    pub async fn handle(&self, req: Request) -> Response {
        let (handler, params) = self.route(&req);
        let entry = compose(&self.middlewares, Arc::new(Rendered(handler)));

        let mut response = entry
            .handle(req.with_params(params))
            .await
            .unwrap_or_else(WebError::into_response);
        Self::finalize_headers(&mut response);
        response
    }

    /// Set content-length for buffered bodies and chunked encoding for streams,
    /// unless the handler already chose one.
    fn finalize_headers(response: &mut Response) {
        if response.headers.contains_key(http::header::CONTENT_LENGTH)
            || response.headers.contains_key(http::header::TRANSFER_ENCODING)
        {
            return;
        }
        match &response.body {
            Body::Bytes(bytes) => {
                response.headers.insert(
                    http::header::CONTENT_LENGTH,
                    http::HeaderValue::from(bytes.len()),
                );
            }
            Body::Stream(_) => {
                response.headers.insert(
                    http::header::TRANSFER_ENCODING,
                    http::HeaderValue::from_static("chunked"),
                );
            }
        }
    }

    /// Wrap the app in a Pingora listening service; add listeners before running.
    pub fn to_service(self, name: &str) -> Service<App> {
        Service::new(name.to_string(), self)
    }
}

/// The route table and middleware stack for `config`, counting into `store`.
pub fn build_app(config: &Config, store: Arc<stats::CounterStore>) -> App {
    let router = handlers::routes(store, utils::SpaDir::new(&config.frontend_dir));
    let mut app = App::new(router);
    app.max_body_bytes(config.max_body_bytes);
    app.use_middleware(TracingMiddleware::new());
    app.use_middleware(PanicRecoveryMiddleware::new());
    app.use_middleware(CorsMiddleware::new());
    app.use_middleware(LimitsMiddleware::with_config(LimitsConfig::from_config(config)));
    app
}

#[async_trait]
impl HttpServerApp for App {
    async fn process_new_http(
        self: &Arc<Self>,
        mut http: ServerSession,
        shutdown: &ShutdownWatch,
    ) -> Option<ReusedHttpStream> {
        if !(http.read_request().await.ok()?) {
            return None;
        }
        if *shutdown.borrow() {
            http.set_keepalive(None);
        } else {
            http.set_keepalive(Some(60));
        }

        let reqh = http.req_header();
        let path = String::from_utf8_lossy(reqh.raw_path()).to_string();
        let is_head = reqh.method == Method::HEAD;

        let mut req = Request::new(reqh.method.clone(), path);
        for (name, value) in reqh.headers.iter() {
            req.headers_mut().append(name.clone(), value.clone());
        }

        // Only read a body when the headers announce one
        if !is_head {
            let chunked = req.headers().contains_key(http::header::TRANSFER_ENCODING);
            let has_len = req
                .headers()
                .get(http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .is_some_and(|n| n > 0);
            if chunked || has_len {
                let mut body = BodyBuffer::new(self.max_body_bytes);
                loop {
                    match http.read_request_body().await {
                        Ok(Some(chunk)) => {
                            if !body.push(&chunk) {
                                // the rest stays unread, so the connection cannot be reused
                                tracing::warn!(limit = self.max_body_bytes, "request body over limit");
                                http.set_keepalive(None);
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to read request body");
                            return None;
                        }
                    }
                }
                req = req.with_body(body.freeze());
            }
        }

        let res = self.handle(req).await;

        let mut builder = HttpResponse::builder().status(res.status);
        for (k, v) in res.headers.iter() {
            builder = builder.header(k, v);
        }
        let (parts, _) = match builder.body(()) {
            Ok(r) => r.into_parts(),
            Err(e) => {
                tracing::error!(error = %e, "invalid response header");
                return None;
            }
        };
        let resp_header: ResponseHeader = parts.into();
        if http
            .write_response_header(Box::new(resp_header))
            .await
            .is_err()
        {
            return None;
        }

        if !is_head {
            match res.body {
                Body::Bytes(bytes) => {
                    let _ = http.write_response_body(bytes, true).await;
                }
                Body::Stream(mut s) => {
                    while let Some(chunk) = s.next().await {
                        if http.write_response_body(chunk, false).await.is_err() {
                            break;
                        }
                    }
                    let _ = http.write_response_body(bytes::Bytes::new(), true).await;
                }
            }
        }

        let persistent_settings = HttpPersistentSettings::for_session(&http);
        match http.finish().await {
            Ok(c) => c.map(|s| ReusedHttpStream::new(s, Some(persistent_settings))),
            Err(_) => None,
        }
    }

    fn h2_options(&self) -> Option<pingora::protocols::http::v2::server::H2Options> {
        None
    }

    fn server_options(&self) -> Option<&HttpServerOptions> {
        None
    }
}
