//! Sune wire protocol types shared between the proxy and its clients.
//!
//! Socket frames are JSON objects discriminated by a `type` field. The
//! envelope stays loosely typed on purpose: field presence is validated by
//! the server so a malformed `begin` yields `missing_fields` rather than a
//! parse error, and unknown `type` values are distinguished from unparsable
//! JSON (`bad_type` vs `bad_json`).

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent by the client to the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a run, or resume an existing one.
    Begin {
        /// Client-chosen run identifier.
        rid: Option<CompactString>,
        /// Upstream API key.
        #[serde(rename = "apiKey")]
        api_key: Option<String>,
        /// Upstream provider selector; OpenRouter when absent.
        provider: Option<CompactString>,
        /// Full normalized request body; when absent the body is
        /// synthesized from the envelope fields below.
        or_body: Option<Value>,
        /// Model identifier (envelope synthesis).
        model: Option<CompactString>,
        /// Conversation messages (envelope synthesis).
        messages: Option<Value>,
        /// Replay cursor: deltas with `seq > after` are redelivered.
        after: Option<i64>,
        /// Sampling temperature (envelope synthesis).
        temperature: Option<Value>,
        /// Top-p sampling (envelope synthesis).
        top_p: Option<Value>,
        /// Maximum tokens to generate (envelope synthesis).
        max_tokens: Option<Value>,
        /// Reasoning channel controls (envelope synthesis).
        reasoning: Option<Value>,
        /// Output verbosity hint (envelope synthesis).
        verbosity: Option<Value>,
        /// Structured output format (envelope synthesis).
        response_format: Option<Value>,
    },
    /// Stop the current run if `rid` matches it.
    Stop {
        /// Run identifier to stop.
        rid: Option<CompactString>,
    },
    /// Any unrecognized frame type.
    #[serde(other)]
    Unknown,
}

/// Messages sent by the proxy to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One output increment, monotone in `seq`.
    Delta {
        /// Sequence number, dense from 0 within a run.
        seq: i64,
        /// Text delta.
        text: String,
        /// Opaque image payloads, in order.
        #[serde(skip_serializing_if = "Option::is_none")]
        images: Option<Vec<Value>>,
    },
    /// Terminal success.
    Done,
    /// Terminal failure, or a per-frame protocol error.
    #[serde(rename = "err")]
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Run lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No run started yet.
    #[default]
    Idle,
    /// Upstream stream in flight.
    Running,
    /// Terminal success.
    Done,
    /// Terminal failure.
    Error,
    /// Terminal, externally induced; clients see it as a failure.
    Evicted,
}

impl Phase {
    /// Whether the phase admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Evicted)
    }
}

/// Snapshot view returned by the HTTP poll endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    /// Run identifier, null when no run exists.
    pub rid: Option<CompactString>,
    /// Last assigned sequence number, −1 before the first delta.
    pub seq: i64,
    /// Current phase.
    pub phase: Phase,
    /// Whether the phase is terminal.
    pub done: bool,
    /// Failure reason for terminal failures, else null.
    pub error: Option<String>,
    /// Concatenation of persisted delta texts plus the unflushed buffer.
    pub text: String,
    /// Concatenation of persisted and unflushed image payloads.
    pub images: Vec<Value>,
}

impl PollResponse {
    /// The fixed response for a uid with no run.
    pub fn sentinel() -> Self {
        Self {
            rid: None,
            seq: -1,
            phase: Phase::Idle,
            done: false,
            error: None,
            text: String::new(),
            images: Vec::new(),
        }
    }
}

/// Why an inbound frame was rejected before reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame was not valid JSON.
    BadJson,
    /// The frame was JSON but not a known message shape.
    BadType,
}

impl DecodeError {
    /// The wire error string for this rejection.
    pub fn reason(self) -> &'static str {
        match self {
            Self::BadJson => "bad_json",
            Self::BadType => "bad_type",
        }
    }
}

/// Decode one inbound frame, distinguishing malformed JSON from an
/// unknown or mis-shaped message.
pub fn decode(text: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|_| DecodeError::BadJson)?;
    match serde_json::from_value::<ClientMessage>(value) {
        Ok(ClientMessage::Unknown) | Err(_) => Err(DecodeError::BadType),
        Ok(message) => Ok(message),
    }
}
