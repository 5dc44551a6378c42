//! Message sanitization.
//!
//! Upstreams reject empty turns, so every message is normalized before
//! dispatch: whitespace-only strings become `"."`, empty text parts are
//! dropped, and a part list that ends up with no text part gets a `"."`
//! text part appended. Roles and unrecognized keys are untouched.

use crate::message::{ChatMessage, Content, Part};

/// Sanitize every message in place. Idempotent.
pub fn sanitize_messages(messages: &mut [ChatMessage]) {
    for message in messages {
        sanitize_message(message);
    }
}

fn sanitize_message(message: &mut ChatMessage) {
    match &mut message.content {
        Content::Text(text) => {
            if text.trim().is_empty() {
                *text = ".".to_owned();
            }
        }
        Content::Parts(parts) => {
            parts.retain(|part| {
                !(part.is_text() && part.text.as_deref().is_none_or(|t| t.trim().is_empty()))
            });
            if !parts.iter().any(Part::is_text) {
                parts.push(Part::text("."));
            }
        }
    }
}
