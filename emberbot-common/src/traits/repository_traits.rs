use async_trait::async_trait;

use crate::error::Error;

/// Durable home for one serialized blob. The trigger repository owns the
/// in-memory representation and the merge semantics; this trait owns nothing
/// but the bytes.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// `Ok(None)` means the backing resource does not exist yet, which
    /// readers treat as "start empty". Any other failure is an error.
    async fn read(&self) -> Result<Option<Vec<u8>>, Error>;

    async fn write(&self, bytes: &[u8]) -> Result<(), Error>;
}
