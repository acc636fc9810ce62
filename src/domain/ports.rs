use crate::domain::errors::DecodeError;
use async_trait::async_trait;

// Need async_trait for async functions in traits
#[async_trait]
pub trait Subscriber<T: Send + 'static>: Send + Sync {
    /// Stable name used in worker logs and drop accounting.
    fn id(&self) -> &str;

    /// Handle one payload. Panics are contained by the bus; they cost the
    /// payload, never the dispatch loop.
    async fn receive(&self, payload: T);
}

/// Decoder for one wire format. Implementations parse a raw frame and
/// publish whatever metrics or events it carried, returning how many.
#[async_trait]
pub trait WireHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn handle(&self, frame: &[u8]) -> Result<usize, DecodeError>;
}
