pub mod gemini;

use std::error::Error as StdError;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::models::chat::Message;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Stream of answer-text deltas coming back from a provider.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

/// Boundary to a hosted chat model.
///
/// Prior turns are passed explicitly on every call; implementations keep no
/// conversational state of their own, which is what lets the relay stay
/// stateless per request.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a streaming completion for `turn`, with `history` as prior
    /// context.
    ///
    /// An `Err` here means nothing has been streamed yet. Errors yielded by
    /// the returned stream happen after delivery has begun and are the
    /// consumer's to handle.
    async fn stream_reply(
        &self,
        history: &[Message],
        turn: &Message,
    ) -> Result<TokenStream, BoxError>;
}

/// Connection settings for the chat model provider, read once at startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// How long to wait for the provider to start answering before the call
    /// is reported as an upstream failure.
    pub first_byte_timeout: Duration,
}
