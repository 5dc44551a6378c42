//! Normalized request body sent to provider adapters.

use crate::message::ChatMessage;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The normalized request one run drives through an adapter.
///
/// Scalar tuning knobs stay loosely typed (`Value`) where upstreams disagree
/// on their domain, mirroring the wire format. Adapters never mutate a body
/// after sanitization; every dialect translation builds a fresh payload.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RequestBody {
    /// Model identifier.
    pub model: CompactString,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Always true for proxy runs.
    #[serde(default)]
    pub stream: bool,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    /// Top-p sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Value>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Reasoning channel controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    /// Output verbosity hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Value>,
    /// Structured output format request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// Provider-specific escape hatches, forwarded verbatim.
    #[serde(flatten)]
    pub rest: BTreeMap<CompactString, Value>,
}

impl RequestBody {
    /// Whether reasoning deltas must be withheld from the output stream.
    pub fn exclude_reasoning(&self) -> bool {
        self.reasoning
            .as_ref()
            .and_then(|r| r.exclude)
            .unwrap_or(false)
    }
}

/// Reasoning channel controls.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Reasoning {
    /// Request extended thinking where the upstream supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Withhold reasoning deltas from the output stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
    /// Effort level for upstreams with discrete reasoning tiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<Value>,
    /// Thinking token budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_thinking_tokens: Option<u64>,
    /// Unrecognized reasoning keys, preserved verbatim.
    #[serde(flatten)]
    pub rest: BTreeMap<CompactString, Value>,
}
