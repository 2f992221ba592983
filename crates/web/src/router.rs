use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use http::Method;
use kiln_http::handler::Dispatch;
use kiln_http::protocol::{DispatchError, Request, Response};
use tracing::warn;

use crate::handler::{RequestHandler, handler_fn};
use crate::static_files::StaticFiles;

type BoxHandler = Box<dyn RequestHandler>;

/// An exact match route table.
///
/// A request is answered by the first of:
/// 1. the static files, when configured and the file exists
/// 2. the handler registered for exactly its method and path
/// 3. the not found handler, `404 Not Found` unless replaced
pub struct Router {
    routes: HashMap<Method, HashMap<String, BoxHandler>>,
    static_files: Option<StaticFiles>,
    not_found: BoxHandler,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Finds the handler registered for `method` and `path`.
    pub fn at(&self, method: &Method, path: &str) -> Option<&dyn RequestHandler> {
        self.routes.get(method).and_then(|paths| paths.get(path)).map(|handler| &**handler)
    }

    pub fn static_files(&self) -> Option<&StaticFiles> {
        self.static_files.as_ref()
    }

    pub(crate) fn set_static_files(&mut self, static_files: StaticFiles) {
        self.static_files = Some(static_files);
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Dispatch for Router {
    async fn resolve(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        if let Some(static_files) = &self.static_files {
            if let Some(response) = static_files.serve(request).await? {
                return Ok(response);
            }
        }

        match self.at(request.method(), request.path()) {
            Some(handler) => handler.invoke(request).await,
            None => self.not_found.invoke(request).await,
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.len()).field("static_files", &self.static_files).finish()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        pub fn $name<H: RequestHandler + 'static>(self, path: impl Into<String>, handler: H) -> Self {
            self.route(Method::$method, path, handler)
        }
    };
}

pub struct RouterBuilder {
    routes: HashMap<Method, HashMap<String, BoxHandler>>,
    static_files: Option<StaticFiles>,
    not_found: Option<BoxHandler>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: HashMap::new(), static_files: None, not_found: None }
    }

    /// Registers `handler` for `method` and the exact `path`.
    ///
    /// Registering the same method and path again replaces the earlier handler.
    pub fn route<H: RequestHandler + 'static>(mut self, method: Method, path: impl Into<String>, handler: H) -> Self {
        let path = path.into();
        let paths = self.routes.entry(method.clone()).or_default();
        if paths.insert(path.clone(), Box::new(handler)).is_some() {
            warn!(%method, %path, "route registered twice, the last registration wins");
        }
        self
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);
    method_route!(connect, CONNECT);
    method_route!(patch, PATCH);
    method_route!(trace, TRACE);

    pub fn static_files(mut self, static_files: StaticFiles) -> Self {
        self.static_files = Some(static_files);
        self
    }

    /// Replaces the handler of requests nothing else answers.
    pub fn not_found<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.not_found = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Router {
        let not_found =
            self.not_found.unwrap_or_else(|| Box::new(handler_fn(|_request: &Request<'_>| Response::not_found())));
        Router { routes: self.routes, static_files: self.static_files, not_found }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("static_files", &self.static_files).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use kiln_http::protocol::NOT_FOUND_BODY;

    use super::*;
    use crate::Json;

    fn body_of(response: &Response) -> Vec<u8> {
        let mut dst = bytes::BytesMut::new();
        if let Some(content) = response.content() {
            content.write_to(&mut dst).unwrap();
        }
        dst.to_vec()
    }

    fn router() -> Router {
        Router::builder()
            .get("/", handler_fn(|_request: &Request<'_>| "get root"))
            .post("/", handler_fn(|_request: &Request<'_>| "post root"))
            .get("/json", handler_fn(|_request: &Request<'_>| Json(vec!["a", "b"])))
            .route(Method::DELETE, "/item", handler_fn(|request: &Request<'_>| request.query().to_string()))
            .build()
    }

    async fn resolve(router: &Router, method: Method, path: &str, query: &str) -> Response {
        router.resolve(&Request::new(method, path, query)).await.unwrap()
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let router = router();
        assert_eq!(router.len(), 4);

        assert_eq!(body_of(&resolve(&router, Method::GET, "/", "").await), b"get root");
        assert_eq!(body_of(&resolve(&router, Method::POST, "/", "").await), b"post root");
        assert_eq!(body_of(&resolve(&router, Method::GET, "/json", "").await), br#"["a","b"]"#);
        assert_eq!(body_of(&resolve(&router, Method::DELETE, "/item", "id=7").await), b"id=7");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let router = router();

        let response = resolve(&router, Method::PUT, "/", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.content().unwrap().media_type(), mime::TEXT_HTML);
        assert_eq!(body_of(&response), NOT_FOUND_BODY.as_bytes());

        // exact match only
        let response = resolve(&router, Method::GET, "/json/", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let router = Router::builder()
            .get("/", handler_fn(|_request: &Request<'_>| "first"))
            .get("/", handler_fn(|_request: &Request<'_>| "second"))
            .build();

        assert_eq!(router.len(), 1);
        assert_eq!(body_of(&resolve(&router, Method::GET, "/", "").await), b"second");
    }

    #[tokio::test]
    async fn custom_not_found() {
        let router = Router::builder()
            .not_found(handler_fn(|request: &Request<'_>| (StatusCode::NOT_FOUND, format!("no {}", request.path()))))
            .build();

        assert!(router.is_empty());
        let response = resolve(&router, Method::GET, "/missing", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(&response), b"no /missing");
    }

    #[tokio::test]
    async fn static_files_come_first() {
        let root = std::env::temp_dir().join(format!("kiln-router-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("json"), "from disk").unwrap();

        let router = Router::builder()
            .static_files(StaticFiles::new("/", &root))
            .get("/json", handler_fn(|_request: &Request<'_>| "from route"))
            .get("/time", handler_fn(|_request: &Request<'_>| "from route"))
            .build();

        assert_eq!(body_of(&resolve(&router, Method::GET, "/json", "").await), b"from disk");
        assert_eq!(body_of(&resolve(&router, Method::GET, "/time", "").await), b"from route");
    }
}
