//! SSE event parsing for the OpenAI Responses streaming API.
//!
//! Responses events carry their kind in a dotted `type` string; only the
//! delta-bearing and failure events matter here, everything else is
//! bookkeeping.

use serde::Deserialize;

/// A raw SSE event from the Responses streaming API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Incremental output text.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    /// Incremental reasoning summary text.
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningDelta { delta: String },
    /// Progressive image render from an image generation call.
    #[serde(rename = "response.image_generation_call.partial_image")]
    PartialImage { partial_image_b64: String },
    /// The response failed after starting.
    #[serde(rename = "response.failed")]
    Failed { response: FailedResponse },
    /// Transport-level error event.
    #[serde(rename = "error")]
    Error { message: Option<String> },
    /// The response finished.
    #[serde(rename = "response.completed")]
    Completed,
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct FailedResponse {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
