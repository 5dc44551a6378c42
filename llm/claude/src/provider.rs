//! Provider implementation for the Claude (Anthropic) adapter.

use crate::{
    Claude, Request, endpoint,
    stream::{BlockDelta, ContentBlock, Event},
};
use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use llm::{
    Provider, ReasoningGate, RequestBody, SseBuffer, StreamEvent,
    reqwest::{Client, Method},
};
use tokio_util::sync::CancellationToken;

impl Provider for Claude {
    fn new(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, endpoint::ANTHROPIC)
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
            .json(&Request::from_body(body));
        let mut gate = ReasoningGate::new(body.exclude_reasoning());

        try_stream! {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(anyhow!("anthropic {status}: {text}"))?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut sse = SseBuffer::new();
            'read: while let Some(next) = bytes.next().await {
                if cancel.is_cancelled() {
                    break;
                }
                for data in sse.feed(&next?) {
                    let event = match serde_json::from_str::<Event>(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("failed to parse anthropic event: {e}, data: {data}");
                            continue;
                        }
                    };
                    match event {
                        Event::ContentBlockStart {
                            content_block: ContentBlock::Text { text },
                        }
                        | Event::ContentBlockDelta {
                            delta: BlockDelta::TextDelta { text },
                        } => {
                            if !text.is_empty() {
                                if let Some(separator) = gate.before_content() {
                                    yield separator;
                                }
                                yield StreamEvent::text(text);
                            }
                        }
                        Event::ContentBlockStart {
                            content_block: ContentBlock::Thinking { thinking },
                        }
                        | Event::ContentBlockDelta {
                            delta: BlockDelta::ThinkingDelta { thinking },
                        } => {
                            if let Some(event) = gate.reasoning(&thinking) {
                                yield event;
                            }
                        }
                        Event::Error { error } => {
                            Err(anyhow!("anthropic: {}", error.message))?;
                        }
                        Event::MessageStop => break 'read,
                        _ => {}
                    }
                }
            }
        }
    }
}
