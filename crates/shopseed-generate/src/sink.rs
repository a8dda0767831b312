use async_trait::async_trait;

use crate::errors::SinkError;

/// Consumer of validated batches, usually a persistence routine.
///
/// `accept` is called once per batch, in order. Returning an error aborts the
/// run; batches accepted earlier stay accepted.
#[async_trait]
pub trait Sink<R: Send + 'static>: Send {
    async fn accept(&mut self, batch: Vec<R>) -> Result<(), SinkError>;
}

/// Accumulates every record in memory.
#[async_trait]
impl<R: Send + 'static> Sink<R> for Vec<R> {
    async fn accept(&mut self, batch: Vec<R>) -> Result<(), SinkError> {
        self.extend(batch);
        Ok(())
    }
}
