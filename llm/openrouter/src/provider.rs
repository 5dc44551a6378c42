//! Provider implementation for OpenRouter chat completions.

use crate::{OpenRouter, endpoint};
use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use llm::{
    Provider, ReasoningGate, RequestBody, SseBuffer, StreamEvent,
    reqwest::{Client, Method},
};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A streamed chat completion chunk.
#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    reasoning: Option<String>,
    images: Option<Vec<Value>>,
}

impl Provider for OpenRouter {
    fn new(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, endpoint::OPENROUTER)
    }

    fn drive(
        &self,
        body: &RequestBody,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent>> + Send + 'static {
        let request = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(body);
        let mut gate = ReasoningGate::new(body.exclude_reasoning());

        try_stream! {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(anyhow!("openrouter {status}: {text}"))?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut sse = SseBuffer::new();
            'read: while let Some(next) = bytes.next().await {
                if cancel.is_cancelled() {
                    break;
                }
                for data in sse.feed(&next?) {
                    if data == "[DONE]" {
                        break 'read;
                    }
                    let chunk = match serde_json::from_str::<Chunk>(&data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::warn!("failed to parse chunk: {e}, data: {data}");
                            continue;
                        }
                    };
                    let Some(choice) = chunk.choices.into_iter().next() else {
                        continue;
                    };
                    if let Some(reason) = choice.delta.reasoning.as_deref()
                        && let Some(event) = gate.reasoning(reason)
                    {
                        yield event;
                    }
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        if let Some(separator) = gate.before_content() {
                            yield separator;
                        }
                        yield StreamEvent::text(content);
                    }
                    for image in choice.delta.images.unwrap_or_default() {
                        yield StreamEvent::image(image);
                    }
                }
            }
        }
    }
}
