//! HTTP response values handed to the renderer.
//!
//! A [`Response`] is a status code plus optional [`Content`]. Content is any
//! type that can name its media type and print its body into the outbound
//! buffer; types that know their exact length up front report it through
//! [`Content::content_length`] so the renderer can write the body in place
//! instead of measuring it in a scratch buffer first.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use mime::Mime;

use crate::protocol::BoxError;

/// The body bytes of the default not found response.
pub const NOT_FOUND_BODY: &str = "404 Not Found";

pub trait Content: Send + Sync {
    fn media_type(&self) -> Mime;

    /// Appends the body to `dst`.
    ///
    /// # Errors
    ///
    /// Any error aborts the response; the connection answers 500 instead.
    fn write_to(&self, dst: &mut BytesMut) -> Result<(), BoxError>;

    /// The exact body length, when it is known without printing the body.
    fn content_length(&self) -> Option<usize> {
        None
    }
}

/// Content backed by a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    media_type: Mime,
    data: Bytes,
}

impl Body {
    pub fn new(media_type: Mime, data: impl Into<Bytes>) -> Self {
        Self { media_type, data: data.into() }
    }

    pub fn html(data: impl Into<Bytes>) -> Self {
        Self::new(mime::TEXT_HTML, data)
    }

    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(mime::TEXT_PLAIN_UTF_8, data)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Content for Body {
    fn media_type(&self) -> Mime {
        self.media_type.clone()
    }

    fn write_to(&self, dst: &mut BytesMut) -> Result<(), BoxError> {
        dst.put_slice(&self.data);
        Ok(())
    }

    fn content_length(&self) -> Option<usize> {
        Some(self.data.len())
    }
}

pub struct Response {
    status: StatusCode,
    content: Option<Box<dyn Content>>,
}

impl Response {
    /// A response without content.
    pub fn new(status: StatusCode) -> Self {
        Self { status, content: None }
    }

    pub fn with_content(status: StatusCode, content: impl Content + 'static) -> Self {
        Self { status, content: Some(Box::new(content)) }
    }

    pub fn ok(content: impl Content + 'static) -> Self {
        Self::with_content(StatusCode::OK, content)
    }

    pub fn html(data: impl Into<Bytes>) -> Self {
        Self::ok(Body::html(data))
    }

    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::ok(Body::text(data))
    }

    pub fn not_found() -> Self {
        Self::with_content(StatusCode::NOT_FOUND, Body::html(NOT_FOUND_BODY))
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn status_mut(&mut self) -> &mut StatusCode {
        &mut self.status
    }

    #[inline]
    pub fn content(&self) -> Option<&dyn Content> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: impl Content + 'static) {
        self.content = Some(Box::new(content));
    }
}

impl From<StatusCode> for Response {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("media_type", &self.content.as_ref().map(|c| c.media_type()))
            .finish()
    }
}
