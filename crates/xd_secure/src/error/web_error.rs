use super::ResponseError;
use crate::core::Response;

/// The error type handlers and middlewares return.
///
/// Wraps any [`ResponseError`]; request context such as the request id is
/// attached by the tracing span, not stored here.
#[derive(Debug)]
pub struct WebError {
    inner: Box<dyn ResponseError>,
}

impl WebError {
    pub fn new<T: ResponseError + 'static>(err: T) -> Self {
        Self {
            inner: Box::new(err),
        }
    }

    pub fn status_code(&self) -> http::StatusCode {
        self.inner.status_code()
    }

    /// Log the error and render it.
    pub fn into_response(self) -> Response {
        let status = self.inner.status_code();
        if status.is_server_error() {
            tracing::error!(status_code = %status, error = %self.inner, "request failed");
        } else {
            tracing::info!(status_code = %status, error = %self.inner, "request rejected");
        }
        self.inner.error_response()
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for WebError {}

impl From<serde_json::Error> for WebError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err)
    }
}

impl From<super::SimpleError> for WebError {
    fn from(err: super::SimpleError) -> Self {
        Self::new(err)
    }
}

impl From<crate::password::PasswordError> for WebError {
    fn from(err: crate::password::PasswordError) -> Self {
        Self::new(err)
    }
}

impl From<crate::stats::StoreError> for WebError {
    fn from(err: crate::stats::StoreError) -> Self {
        Self::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimpleError;
    use http::StatusCode;

    #[test]
    fn wraps_status_and_message() {
        let err: WebError = SimpleError::new(StatusCode::BAD_REQUEST, "nope".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn renders_error_json() {
        let err = SimpleError::new(StatusCode::BAD_REQUEST, "Select at least one character set".to_string());
        let res = WebError::new(err).into_response();
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(res.body_bytes().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Select at least one character set"}));
    }

    #[test]
    fn bad_json_maps_to_400() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(WebError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }
}
