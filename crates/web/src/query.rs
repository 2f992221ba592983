use kiln_http::protocol::Request;
use serde::Deserialize;

/// Deserializes the query string of `request`.
///
/// Fields may borrow from the request, which lives for one request cycle.
///
/// # Errors
///
/// Fails when the query does not match the shape of `T`.
pub fn query_as<'a, T>(request: &Request<'a>) -> Result<T, serde_urlencoded::de::Error>
where
    T: Deserialize<'a>,
{
    serde_urlencoded::from_str(request.query())
}
