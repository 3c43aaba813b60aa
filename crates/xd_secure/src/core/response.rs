use std::path::Path;

use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::io::AsyncReadExt;

const FILE_CHUNK: usize = 64 * 1024;

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

pub enum Body {
    Bytes(Bytes),
    Stream(BoxStream<'static, Bytes>),
}

impl Response {
    /// Empty response with the given status. Does not set content-type.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Bytes(Bytes::new()),
        }
    }

    pub fn text<S: Into<String>>(status: StatusCode, body: S) -> Self {
        Self::with_content_type(status, "text/plain; charset=utf-8", body.into())
    }

    pub fn html<S: Into<String>>(status: StatusCode, body: S) -> Self {
        Self::with_content_type(status, "text/html; charset=utf-8", body.into())
    }

    fn with_content_type(status: StatusCode, content_type: &'static str, body: String) -> Self {
        let mut res = Self::empty(status);
        res.headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        res.body = Body::Bytes(Bytes::from(body));
        res
    }

    /// Serialize `value` as the JSON body. A value that fails to serialize yields an empty 500.
    pub fn json(status: StatusCode, value: impl serde::Serialize) -> Self {
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                let mut res = Self::empty(status);
                res.headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                res.body = Body::Bytes(Bytes::from(bytes));
                res
            }
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Stream a file from disk in fixed-size chunks without buffering it whole.
    ///
    /// The content type is guessed from the extension; `len` becomes the
    /// content-length when known.
    pub fn stream_file(status: StatusCode, path: &Path, len: Option<u64>) -> Self {
        let mut res = Self::empty(status);
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if let Ok(ct) = HeaderValue::from_str(mime.as_ref()) {
            res.headers.insert(http::header::CONTENT_TYPE, ct);
        }
        if let Some(len) = len {
            res.headers
                .insert(http::header::CONTENT_LENGTH, HeaderValue::from(len));
        }

        let path = path.to_path_buf();
        let chunks = futures::stream::unfold(
            Some((None::<tokio::fs::File>, path)),
            |state| async move {
                let (file, path) = state?;
                let mut file = match file {
                    Some(f) => f,
                    None => match tokio::fs::File::open(&path).await {
                        Ok(f) => f,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "static file vanished");
                            return None;
                        }
                    },
                };
                let mut buf = vec![0u8; FILE_CHUNK];
                match file.read(&mut buf).await {
                    Ok(0) | Err(_) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some((Bytes::from(buf), Some((Some(file), path))))
                    }
                }
            },
        );
        res.body = Body::Stream(Box::pin(chunks));
        res
    }

    pub fn set_header<K, V>(&mut self, k: K, v: V)
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(key), Ok(value)) = (k.try_into(), v.try_into()) {
            self.headers.insert(key, value);
        }
    }

    pub fn header<K, V>(mut self, k: K, v: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<HeaderValue>,
    {
        self.set_header(k, v);
        self
    }

    /// Buffered body bytes, `None` for streaming bodies.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            Body::Stream(_) => None,
        }
    }
}
