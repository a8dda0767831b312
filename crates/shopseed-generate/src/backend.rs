use std::fmt;

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;

use crate::errors::BackendError;

/// Instruction pair plus an output-size bound for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Backend output, either as one blob or as fragments in arrival order.
pub enum Completion {
    Text(String),
    Fragments(BoxStream<'static, Result<String, BackendError>>),
}

impl Completion {
    /// Concatenate the completion into a single text blob.
    ///
    /// Fragments are never interpreted on their own; the first failing
    /// fragment aborts the whole completion.
    pub async fn into_text(self) -> Result<String, BackendError> {
        match self {
            Completion::Text(text) => Ok(text),
            Completion::Fragments(fragments) => {
                fragments
                    .try_fold(String::new(), |mut text, fragment| async move {
                        text.push_str(&fragment);
                        Ok(text)
                    })
                    .await
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Completion::Fragments(_) => f.write_str("Fragments(..)"),
        }
    }
}

/// Generative text backend. Output is untrusted text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError>;
}
