//! Upstream dispatch: one uniform streaming contract over four dialects.
//!
//! The coordinator drives runs through the [`Driver`] trait so tests can
//! substitute scripted streams; [`HttpDriver`] is the production
//! implementation backed by the provider adapter crates.

use anyhow::Result;
use claude::Claude;
use futures_util::{Stream, stream};
use gemini::Gemini;
use llm::{Client, Provider, ProviderKind, RequestBody, StreamEvent};
use openai::OpenAi;
use openrouter::OpenRouter;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A boxed adapter stream.
pub type DriveStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Uniform streaming contract the coordinator drives runs through.
pub trait Driver: Send + Sync + 'static {
    /// Stream one run against the selected upstream.
    fn drive(
        &self,
        provider: ProviderKind,
        api_key: &str,
        body: &RequestBody,
        cancel: CancellationToken,
    ) -> DriveStream;
}

/// Production driver: constructs the provider adapter for each run and
/// streams over HTTP.
#[derive(Clone)]
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    /// Create a driver over a shared HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Driver for HttpDriver {
    fn drive(
        &self,
        provider: ProviderKind,
        api_key: &str,
        body: &RequestBody,
        cancel: CancellationToken,
    ) -> DriveStream {
        match provider {
            ProviderKind::OpenAi => adapter::<OpenAi>(self.client.clone(), api_key, body, cancel),
            ProviderKind::Anthropic => {
                adapter::<Claude>(self.client.clone(), api_key, body, cancel)
            }
            ProviderKind::Google => adapter::<Gemini>(self.client.clone(), api_key, body, cancel),
            ProviderKind::OpenRouter => {
                adapter::<OpenRouter>(self.client.clone(), api_key, body, cancel)
            }
        }
    }
}

fn adapter<P: Provider>(
    client: Client,
    api_key: &str,
    body: &RequestBody,
    cancel: CancellationToken,
) -> DriveStream {
    match P::new(client, api_key) {
        Ok(adapter) => Box::pin(adapter.drive(body, cancel)),
        Err(e) => Box::pin(stream::once(async move { Err(e) })),
    }
}
