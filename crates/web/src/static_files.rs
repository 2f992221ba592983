use std::io;
use std::path::{Path, PathBuf};

use kiln_http::protocol::{Body, DispatchError, Request, Response};
use tracing::trace;

use crate::content_type;

/// Serves files below `root` for request paths starting with `prefix`.
///
/// A path containing `..` is answered with `404`. A directory serves its
/// `index.html`. A file that does not exist is not answered at all, so the
/// route table gets its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFiles {
    prefix: String,
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into(), root: root.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `Ok(None)` when the request is not for a static file.
    ///
    /// # Errors
    ///
    /// Fails when a file exists but cannot be read.
    pub async fn serve(&self, request: &Request<'_>) -> Result<Option<Response>, DispatchError> {
        let Some(relative) = request.path().strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };
        if request.path().contains("..") {
            return Ok(Some(Response::not_found()));
        }

        let mut path = self.root.join(relative.trim_start_matches('/'));
        let media_type = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => {
                path.push("index.html");
                mime::TEXT_HTML
            }
            Ok(_) => content_type::from_path(&path),
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(DispatchError::handler(e)),
        };

        match tokio::fs::read(&path).await {
            Ok(data) => {
                trace!(path = %path.display(), len = data.len(), "serve static file");
                Ok(Some(Response::ok(Body::new(media_type, data))))
            }
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(DispatchError::handler(e)),
        }
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{Method, StatusCode};

    use super::*;

    /// A fresh directory under the system temp dir.
    fn scratch_dir() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "kiln-static-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.join("script.js"), "update();").unwrap();
        std::fs::write(dir.join("docs/index.html"), "<h1>docs</h1>").unwrap();
        std::fs::write(dir.join("docs/blob"), [0u8, 1, 2]).unwrap();
        dir
    }

    fn body_of(response: &Response) -> Vec<u8> {
        let mut dst = bytes::BytesMut::new();
        response.content().unwrap().write_to(&mut dst).unwrap();
        dst.to_vec()
    }

    async fn serve(files: &StaticFiles, path: &str) -> Option<Response> {
        files.serve(&Request::new(Method::GET, path, "")).await.unwrap()
    }

    #[tokio::test]
    async fn serves_file_with_media_type() {
        let files = StaticFiles::new("/", scratch_dir());

        let response = serve(&files, "/script.js").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content().unwrap().media_type(), mime::TEXT_JAVASCRIPT);
        assert_eq!(body_of(&response), b"update();");

        let response = serve(&files, "/docs/blob").await.unwrap();
        assert_eq!(response.content().unwrap().media_type(), mime::APPLICATION_OCTET_STREAM);
    }

    #[tokio::test]
    async fn directory_serves_index() {
        let files = StaticFiles::new("/", scratch_dir());

        let response = serve(&files, "/").await.unwrap();
        assert_eq!(response.content().unwrap().media_type(), mime::TEXT_HTML);
        assert_eq!(body_of(&response), b"<h1>home</h1>");

        let response = serve(&files, "/docs").await.unwrap();
        assert_eq!(body_of(&response), b"<h1>docs</h1>");
    }

    #[tokio::test]
    async fn parent_path_is_rejected() {
        let files = StaticFiles::new("/", scratch_dir());

        let response = serve(&files, "/docs/../index.html").await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_file_falls_through() {
        let files = StaticFiles::new("/", scratch_dir());
        assert!(serve(&files, "/json").await.is_none());
        assert!(serve(&files, "/script.js/more").await.is_none());
    }

    #[tokio::test]
    async fn other_prefix_is_ignored() {
        let files = StaticFiles::new("/assets", scratch_dir());
        assert!(serve(&files, "/script.js").await.is_none());

        let response = serve(&files, "/assets/script.js").await.unwrap();
        assert_eq!(body_of(&response), b"update();");
    }
}
