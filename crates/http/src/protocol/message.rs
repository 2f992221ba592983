use crate::protocol::{ConnectionPolicy, Response};

/// Everything the response encoder needs to serialize one response.
///
/// The connection policy is decided by the connection task, not by the
/// handler, so it travels next to the response instead of inside it.
#[derive(Debug)]
pub struct ResponseMessage {
    response: Response,
    policy: ConnectionPolicy,
    omit_body: bool,
}

impl ResponseMessage {
    pub fn new(response: Response, policy: ConnectionPolicy) -> Self {
        Self { response, policy, omit_body: false }
    }

    /// Keeps every header, including `Content-Length`, but drops the body bytes.
    /// Used for `HEAD` requests.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[inline]
    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    #[inline]
    pub fn omit_body(&self) -> bool {
        self.omit_body
    }
}
