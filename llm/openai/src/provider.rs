//! Provider implementation for the OpenAI Responses adapter.

use crate::{OpenAi, Request, endpoint, stream::Event};
use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use llm::{
    Provider, ReasoningGate, RequestBody, SseBuffer, StreamEvent,
    reqwest::{Client, Method},
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

impl Provider for OpenAi {
    fn new(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, endpoint::OPENAI)
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
                Err(anyhow!("openai {status}: {text}"))?;
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
                    let event = match serde_json::from_str::<Event>(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("failed to parse openai event: {e}, data: {data}");
                            continue;
                        }
                    };
                    match event {
                        Event::OutputTextDelta { delta } => {
                            if !delta.is_empty() {
                                if let Some(separator) = gate.before_content() {
                                    yield separator;
                                }
                                yield StreamEvent::text(delta);
                            }
                        }
                        Event::ReasoningDelta { delta } => {
                            if let Some(event) = gate.reasoning(&delta) {
                                yield event;
                            }
                        }
                        Event::PartialImage { partial_image_b64 } => {
                            yield StreamEvent::image(Value::String(format!(
                                "data:image/png;base64,{partial_image_b64}"
                            )));
                        }
                        Event::Failed { response } => {
                            let message = response
                                .error
                                .map(|e| e.message)
                                .unwrap_or_else(|| "response failed".to_owned());
                            Err(anyhow!("openai: {message}"))?;
                        }
                        Event::Error { message } => {
                            let message = message.unwrap_or_else(|| "stream error".to_owned());
                            Err(anyhow!("openai: {message}"))?;
                        }
                        Event::Completed => break 'read,
                        Event::Unknown => {}
                    }
                }
            }
        }
    }
}
