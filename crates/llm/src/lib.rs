//! Unified LLM interface types shared across all provider adapters.
//!
//! This crate provides the canonical request body and message shapes, the
//! message sanitizer, the incremental SSE splitter, the reasoning-channel
//! gate, and the `Provider` trait every upstream adapter implements.

pub use body::{Reasoning, RequestBody};
pub use message::{ChatMessage, Content, Part, Role};
pub use provider::{Provider, ProviderKind, is_cancel};
pub use reqwest::{self, Client};
pub use sanitize::sanitize_messages;
pub use sse::SseBuffer;
pub use stream::{ReasoningGate, StreamEvent};

mod body;
mod message;
mod provider;
mod sanitize;
mod sse;
mod stream;
