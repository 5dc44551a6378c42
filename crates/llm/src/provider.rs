//! Provider abstractions for the streaming adapters.

use crate::{RequestBody, StreamEvent};
use anyhow::Result;
use futures_core::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Which upstream dialect drives a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProviderKind {
    /// OpenAI Responses API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Messages API.
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Google GenerativeLanguage SSE API.
    #[serde(rename = "google")]
    Google,
    /// OpenRouter chat completions (default).
    #[serde(rename = "openrouter")]
    #[default]
    OpenRouter,
}

/// A trait for streaming LLM provider adapters.
///
/// `drive` yields output increments in arrival order and finishes when the
/// upstream stream ends. Adapters check `cancel` between network reads and
/// abandon the stream promptly once it fires; dropping the stream mid-read
/// tears down the underlying transport. Cancellation is never reported as
/// an `Err` item.
pub trait Provider: Sized {
    /// Create a new provider adapter with pre-built auth headers.
    fn new(client: Client, key: &str) -> Result<Self>;

    /// Stream one run against the upstream. The returned stream owns its
    /// request; implementations build the payload eagerly so the stream
    /// outlives the borrows of `self` and `body`.
    fn drive(
        &self,
        body: &RequestBody,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent>> + Send + 'static;
}

/// Whether an adapter error reports cancellation rather than upstream
/// failure. Aborted transports must not be surfaced as run failures.
pub fn is_cancel(err: &anyhow::Error) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("abort") || text.contains("cancel")
}
