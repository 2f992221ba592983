use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use kiln_http::protocol::{DispatchError, Request, Response};

use crate::responder::Responder;

/// The handler of one route.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, request: &Request<'_>) -> Result<Response, DispatchError>;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        self.as_ref().invoke(request).await
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        self.as_ref().invoke(request).await
    }
}

/// a plain `Fn` holder whose return value is any [`Responder`]
pub struct FnHandler<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

impl<F, R> FnHandler<F, R>
where
    F: Fn(&Request<'_>) -> R + Send + Sync,
    R: Responder,
{
    fn new(f: F) -> Self {
        Self { f, _phantom: PhantomData }
    }
}

pub fn handler_fn<F, R>(f: F) -> FnHandler<F, R>
where
    F: Fn(&Request<'_>) -> R + Send + Sync,
    R: Responder,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F, R> RequestHandler for FnHandler<F, R>
where
    F: Fn(&Request<'_>) -> R + Send + Sync,
    R: Responder,
{
    async fn invoke(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        let responder = (self.f)(request);
        Ok(responder.response_to(request))
    }
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &std::any::type_name::<F>()).finish()
    }
}
