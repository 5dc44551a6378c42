//! SSE event parsing for the Anthropic streaming Messages API.
//!
//! Anthropic events differ from the chat-completions format:
//! - `message_start` — initial message metadata
//! - `content_block_start` — begin a content block (text or thinking)
//! - `content_block_delta` — incremental content (`text_delta` or
//!   `thinking_delta`)
//! - `content_block_stop` / `message_delta` / `message_stop` — bookkeeping
//! - `error` — mid-stream failure

use serde::Deserialize;

/// A raw SSE event from the Anthropic streaming API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Initial message metadata.
    MessageStart {},
    /// Begin a content block.
    ContentBlockStart { content_block: ContentBlock },
    /// Incremental content within a block.
    ContentBlockDelta { delta: BlockDelta },
    /// End of a content block.
    ContentBlockStop {},
    /// Final message delta (stop reason + usage).
    MessageDelta {},
    /// End of message.
    MessageStop,
    /// Ping (keep-alive).
    Ping,
    /// Mid-stream failure.
    Error { error: ErrorBody },
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_parses() {
        let event: Event = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            Event::ContentBlockDelta {
                delta: BlockDelta::TextDelta { ref text }
            } if text == "hi"
        ));
    }

    #[test]
    fn thinking_delta_parses() {
        let event: Event = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"let me"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            Event::ContentBlockDelta {
                delta: BlockDelta::ThinkingDelta { ref thinking }
            } if thinking == "let me"
        ));
    }

    #[test]
    fn unknown_events_tolerated() {
        let event: Event =
            serde_json::from_str(r#"{"type":"content_block_signature","whatever":1}"#).unwrap();
        assert!(matches!(event, Event::Unknown));
    }

    #[test]
    fn error_event_parses() {
        let event: Event = serde_json::from_str(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"busy"}}"#,
        )
        .unwrap();
        assert!(matches!(event, Event::Error { ref error } if error.message == "busy"));
    }
}
