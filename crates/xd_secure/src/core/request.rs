use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Uri};
use serde::de::DeserializeOwned;

#[derive(Debug)]
pub struct Request {
    pub inner: http::Request<Bytes>,
    pub params: HashMap<String, String>,
}

impl Request {
    /// Build a request for `path`. A path that is not a valid URI degrades to `/`.
    pub fn new<M: Into<Method>, S: AsRef<str>>(method: M, path: S) -> Self {
        let uri = path
            .as_ref()
            .parse::<Uri>()
            .unwrap_or_else(|_| Uri::from_static("/"));
        let mut inner = http::Request::new(Bytes::new());
        *inner.method_mut() = method.into();
        *inner.uri_mut() = uri;

        Self {
            inner,
            params: HashMap::new(),
        }
    }

    pub fn header<K, V>(mut self, k: K, v: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(key), Ok(value)) = (k.try_into(), v.try_into()) {
            self.inner.headers_mut().insert(key, value);
        }
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        *self.inner.body_mut() = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap<HeaderValue> {
        self.inner.headers_mut()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// Decode the body as JSON. An empty (or all-whitespace) body decodes as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let body = self.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"{}");
        }
        serde_json::from_slice(body)
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(crate::utils::request_id::HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default)]
        n: u32,
    }

    #[test]
    fn empty_body_decodes_as_empty_object() {
        let req = Request::new(Method::POST, "/generate");
        let probe: Probe = req.json().expect("empty body is {}");
        assert_eq!(probe.n, 0);

        let req = Request::new(Method::POST, "/generate").with_body("  \n");
        assert!(req.json::<Probe>().is_ok());
    }

    #[test]
    fn malformed_body_is_an_error() {
        let req = Request::new(Method::POST, "/generate").with_body("{\"n\":");
        assert!(req.json::<Probe>().is_err());
    }

    #[test]
    fn path_excludes_query() {
        let req = Request::new(Method::GET, "/api/stats?x=1");
        assert_eq!(req.path(), "/api/stats");
        assert_eq!(req.uri().query(), Some("x=1"));
    }
}
