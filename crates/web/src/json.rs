use bytes::{BufMut, BytesMut};
use kiln_http::protocol::{BoxError, Content};
use mime::Mime;
use serde::Serialize;

/// JSON content.
///
/// The value is serialized straight into the outbound buffer when the
/// response is rendered, so its length is only known once it has been printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Content for Json<T>
where
    T: Serialize + Send + Sync,
{
    fn media_type(&self) -> Mime {
        mime::APPLICATION_JSON
    }

    fn write_to(&self, dst: &mut BytesMut) -> Result<(), BoxError> {
        serde_json::to_writer(dst.writer(), &self.0)?;
        Ok(())
    }
}
