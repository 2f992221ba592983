//! The seams between the connection task and the application.
//!
//! - [`Dispatch`] turns a parsed [`Request`] into a [`Response`]; routing and
//!   static files live behind it, outside of this crate
//! - [`Middleware`] observes every parsed request before dispatch
//! - [`HttpService`] bundles one dispatcher with its ordered middlewares and is
//!   shared read-only by every connection task

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{DispatchError, Request, Response};

#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Resolves a request. Runs on the connection task, so any suspension here
    /// holds only this connection.
    async fn resolve(&self, request: &Request<'_>) -> Result<Response, DispatchError>;
}

#[async_trait]
impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    async fn resolve(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        self.as_ref().resolve(request).await
    }
}

/// A [`Dispatch`] backed by a plain function.
#[derive(Debug)]
pub struct DispatchFn<F> {
    f: F,
}

#[async_trait]
impl<F> Dispatch for DispatchFn<F>
where
    F: Fn(&Request<'_>) -> Result<Response, DispatchError> + Send + Sync,
{
    async fn resolve(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        (self.f)(request)
    }
}

pub fn make_dispatch<F>(f: F) -> DispatchFn<F>
where
    F: Fn(&Request<'_>) -> Result<Response, DispatchError> + Send + Sync,
{
    DispatchFn { f }
}

/// Observes a request before it is dispatched. Must not block.
pub trait Middleware: Send + Sync {
    fn on_request_received(&self, request: &Request<'_>);
}

impl<F> Middleware for F
where
    F: Fn(&Request<'_>) + Send + Sync,
{
    fn on_request_received(&self, request: &Request<'_>) {
        self(request)
    }
}

/// Middlewares in registration order.
#[derive(Clone, Default)]
pub struct Middlewares {
    inner: Vec<Arc<dyn Middleware>>,
}

impl Middlewares {
    pub fn builder() -> MiddlewaresBuilder {
        MiddlewaresBuilder::new()
    }

    pub fn on_request_received(&self, request: &Request<'_>) {
        for middleware in &self.inner {
            middleware.on_request_received(request);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middlewares").field("len", &self.inner.len()).finish()
    }
}

#[derive(Default)]
pub struct MiddlewaresBuilder {
    inner: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for MiddlewaresBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewaresBuilder").field("len", &self.inner.len()).finish()
    }
}

impl MiddlewaresBuilder {
    fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn add_first(mut self, middleware: impl Middleware + 'static) -> Self {
        self.inner.insert(0, Arc::new(middleware));
        self
    }

    pub fn add_last(mut self, middleware: impl Middleware + 'static) -> Self {
        self.inner.push(Arc::new(middleware));
        self
    }

    pub fn add_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.inner.push(middleware);
        self
    }

    pub fn build(self) -> Middlewares {
        Middlewares { inner: self.inner }
    }
}

/// What every connection task runs requests against.
#[derive(Debug)]
pub struct HttpService<D> {
    dispatch: D,
    middlewares: Middlewares,
}

impl<D: Dispatch> HttpService<D> {
    pub fn new(dispatch: D) -> Self {
        Self { dispatch, middlewares: Middlewares::default() }
    }

    pub fn with_middlewares(dispatch: D, middlewares: Middlewares) -> Self {
        Self { dispatch, middlewares }
    }

    #[inline]
    pub fn dispatch(&self) -> &D {
        &self.dispatch
    }

    #[inline]
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }
}
