use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use http::StatusCode;

use crate::core::{Handler, Request, Response};
use crate::error::WebError;

pub const INDEX: &str = "index.html";

/// Serves a single-page app from a directory.
///
/// Mount on `/` and `/{*path}`. An existing file under the root is streamed;
/// any other path gets `index.html` so client-side routes resolve.
/// `..` and absolute components are dropped before joining, so requests
/// cannot leave the root.
#[derive(Debug, Clone)]
pub struct SpaDir {
    root: PathBuf,
}

impl SpaDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sanitize(rel: &str) -> PathBuf {
        Path::new(rel)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// The file to serve for `rel`, if it names a regular file.
    async fn resolve(&self, rel: &str) -> Option<(PathBuf, u64)> {
        let safe = Self::sanitize(rel);
        if safe.as_os_str().is_empty() {
            return None;
        }
        let full = self.root.join(safe);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Some((full, meta.len())),
            _ => None,
        }
    }
}

#[async_trait]
impl Handler for SpaDir {
    async fn handle(&self, req: Request) -> Result<Response, WebError> {
        let requested = match req.param("path") {
            Some(rel) => self.resolve(rel).await,
            None => None,
        };
        let found = match requested {
            Some(hit) => Some(hit),
            None => self.resolve(INDEX).await,
        };

        Ok(match found {
            Some((path, len)) => Response::stream_file(StatusCode::OK, &path, Some(len)),
            None => {
                tracing::warn!(root = %self.root.display(), "frontend index.html missing");
                Response::text(StatusCode::NOT_FOUND, "Not Found")
            }
        })
    }
}
