//! Provider implementation for the Gemini adapter.

use crate::{Gemini, Request, endpoint, request::split_online};
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

/// A streamed generation chunk.
#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Debug, Deserialize)]
struct ChunkPart {
    text: Option<String>,
    /// Set on reasoning parts when thought summaries are enabled.
    #[serde(default)]
    thought: bool,
    #[serde(rename = "inlineData")]
    inline_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl Provider for Gemini {
    fn new(client: Client, key: &str) -> Result<Self> {
        Self::custom(client, key, endpoint::GOOGLE)
    }

    fn drive(
        &self,
        body: &RequestBody,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent>> + Send + 'static {
        let (model, online) = split_online(&body.model);
        let request = self
            .client
            .request(Method::POST, self.stream_url(model))
            .headers(self.headers.clone())
            .json(&Request::from_body(body, online));
        let mut gate = ReasoningGate::new(body.exclude_reasoning());

        try_stream! {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(anyhow!("google {status}: {text}"))?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut sse = SseBuffer::new();
            while let Some(next) = bytes.next().await {
                if cancel.is_cancelled() {
                    break;
                }
                for data in sse.feed(&next?) {
                    let chunk = match serde_json::from_str::<Chunk>(&data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::warn!("failed to parse google chunk: {e}, data: {data}");
                            continue;
                        }
                    };
                    if let Some(error) = chunk.error {
                        Err(anyhow!("google: {}", error.message))?;
                    }
                    let parts = chunk
                        .candidates
                        .into_iter()
                        .next()
                        .and_then(|c| c.content)
                        .map(|c| c.parts)
                        .unwrap_or_default();
                    for part in parts {
                        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                            if part.thought {
                                if let Some(event) = gate.reasoning(&text) {
                                    yield event;
                                }
                            } else {
                                if let Some(separator) = gate.before_content() {
                                    yield separator;
                                }
                                yield StreamEvent::text(text);
                            }
                        }
                        if let Some(image) = part.inline_data {
                            yield StreamEvent::image(image);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_parses_text_parts() {
        let chunk: Chunk = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            chunk.candidates[0].content.as_ref().unwrap().parts[0]
                .text
                .as_deref(),
            Some("hi")
        );
    }

    #[test]
    fn chunk_parses_thought_flag() {
        let chunk: Chunk = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"mull","thought":true}]}}]}"#,
        )
        .unwrap();
        assert!(chunk.candidates[0].content.as_ref().unwrap().parts[0].thought);
    }

    #[test]
    fn chunk_parses_error() {
        let chunk: Chunk =
            serde_json::from_str(r#"{"error":{"code":429,"message":"quota"}}"#).unwrap();
        assert_eq!(chunk.error.unwrap().message, "quota");
    }
}
