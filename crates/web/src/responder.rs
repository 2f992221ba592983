//! Response handling module that converts handler results into responses.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! become a [`Response`]. It includes implementations for common types like
//! `Result`, `Option`, `String` and [`Json`].

use std::convert::Infallible;

use http::StatusCode;
use kiln_http::protocol::{Body, Request, Response};
use serde::Serialize;

use crate::Json;

/// A trait for types that can be converted into responses.
///
/// Types implementing this trait can be returned directly from handlers
/// created with [`handler_fn`](crate::handler_fn).
pub trait Responder {
    fn response_to(self, request: &Request<'_>) -> Response;
}

/// Both variants must implement `Responder`.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, request: &Request<'_>) -> Response {
        match self {
            Ok(t) => t.response_to(request),
            Err(e) => e.response_to(request),
        }
    }
}

/// `None` answers `404 Not Found`.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, request: &Request<'_>) -> Response {
        match self {
            Some(t) => t.response_to(request),
            None => Response::not_found(),
        }
    }
}

impl Responder for Response {
    fn response_to(self, _request: &Request<'_>) -> Response {
        self
    }
}

impl Responder for StatusCode {
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::new(self)
    }
}

/// Sets the status code of the inner response.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, request: &Request<'_>) -> Response {
        let (status, responder) = self;
        let mut response = responder.response_to(request);
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, request: &Request<'_>) -> Response {
        (*self).response_to(request)
    }
}

/// An empty `200 OK`.
impl Responder for () {
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::new(StatusCode::OK)
    }
}

impl Responder for &'static str {
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::text(self)
    }
}

impl Responder for String {
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::text(self)
    }
}

impl Responder for Body {
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::ok(self)
    }
}

impl<T> Responder for Json<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn response_to(self, _request: &Request<'_>) -> Response {
        Response::ok(self)
    }
}

impl Responder for Infallible {
    fn response_to(self, _request: &Request<'_>) -> Response {
        match self {}
    }
}
