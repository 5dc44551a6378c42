//! Request body translation for the Anthropic Messages API.
//!
//! The canonical shape differs from Anthropic's in three ways: system-role
//! messages live in a top-level `system` field, image parts are base64
//! source blocks parsed out of `data:` URLs, and `max_tokens` is mandatory.

use compact_str::CompactString;
use llm::{Content, Part, RequestBody, Role};
use serde::Serialize;
use serde_json::{Value, json};

/// Anthropic requires `max_tokens`; this is the ceiling used when the
/// normalized body leaves it unset.
pub const DEFAULT_MAX_TOKENS: u64 = 64_000;

/// The request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: CompactString,
    /// Maximum tokens to generate.
    pub max_tokens: u64,
    /// Whether to stream the response.
    pub stream: bool,
    /// Concatenated system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Non-system conversation turns.
    pub messages: Vec<Value>,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Value>,
    /// Extended thinking configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
}

impl Request {
    /// Translate a normalized body into the Anthropic dialect.
    pub fn from_body(body: &RequestBody) -> Self {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();

        for message in &body.messages {
            match message.role {
                Role::System => system_parts.push(message.content.joined_text()),
                role => messages.push(json!({
                    "role": if role == Role::Assistant { "assistant" } else { "user" },
                    "content": content_blocks(&message.content),
                })),
            }
        }

        let thinking = body
            .reasoning
            .as_ref()
            .filter(|r| r.enabled == Some(true))
            .map(|r| {
                let mut thinking = json!({ "type": "enabled" });
                if let Some(budget) = r.max_thinking_tokens {
                    thinking["budget_tokens"] = budget.into();
                }
                thinking
            });

        Self {
            model: body.model.clone(),
            max_tokens: body.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: true,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
            temperature: body.temperature.clone(),
            top_p: body.top_p.clone(),
            thinking,
        }
    }
}

fn content_blocks(content: &Content) -> Vec<Value> {
    match content {
        Content::Text(text) => vec![json!({ "type": "text", "text": text })],
        Content::Parts(parts) => parts.iter().filter_map(block_for).collect(),
    }
}

fn block_for(part: &Part) -> Option<Value> {
    if part.is_text() {
        Some(json!({ "type": "text", "text": part.text.clone()? }))
    } else if part.is_image() {
        let (media_type, data) = parse_data_url(part.url()?)?;
        Some(json!({
            "type": "image",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        }))
    } else if part.is_file() {
        let (media_type, data) = parse_data_url(part.file_data()?)?;
        Some(json!({
            "type": "document",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        }))
    } else {
        None
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into mime type and payload.
fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    Some((meta.strip_suffix(";base64")?, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{ChatMessage, Reasoning};
    use serde_json::json;

    fn body_with(messages: Vec<ChatMessage>) -> RequestBody {
        RequestBody {
            model: "claude-x".into(),
            messages,
            stream: true,
            ..Default::default()
        }
    }

    #[test]
    fn system_messages_concatenate() {
        let req = Request::from_body(&body_with(vec![
            ChatMessage::system("one"),
            ChatMessage::system("two"),
            ChatMessage::user("hi"),
        ]));
        assert_eq!(req.system.as_deref(), Some("one\n\ntwo"));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0]["role"], "user");
    }

    #[test]
    fn max_tokens_defaults() {
        let req = Request::from_body(&body_with(vec![ChatMessage::user("hi")]));
        assert_eq!(req.max_tokens, DEFAULT_MAX_TOKENS);

        let explicit = RequestBody {
            max_tokens: Some(512),
            ..body_with(vec![ChatMessage::user("hi")])
        };
        assert_eq!(Request::from_body(&explicit).max_tokens, 512);
    }

    #[test]
    fn data_url_becomes_base64_source() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                { "type": "text", "text": "look" },
                { "type": "image_url", "image_url": { "url": "data:image/png;base64,QUJD" } },
            ],
        }))
        .unwrap();
        let req = Request::from_body(&body_with(vec![message]));
        let blocks = req.messages[0]["content"].as_array().unwrap();
        assert_eq!(blocks[1]["type"], "image");
        assert_eq!(blocks[1]["source"]["media_type"], "image/png");
        assert_eq!(blocks[1]["source"]["data"], "QUJD");
    }

    #[test]
    fn file_part_becomes_document_block() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                { "type": "text", "text": "read" },
                { "type": "file", "file": {
                    "filename": "notes.pdf",
                    "file_data": "data:application/pdf;base64,UERG",
                }},
            ],
        }))
        .unwrap();
        let req = Request::from_body(&body_with(vec![message]));
        let blocks = req.messages[0]["content"].as_array().unwrap();
        assert_eq!(blocks[1]["type"], "document");
        assert_eq!(blocks[1]["source"]["media_type"], "application/pdf");
        assert_eq!(blocks[1]["source"]["data"], "UERG");
    }

    #[test]
    fn non_base64_url_dropped() {
        assert!(parse_data_url("https://example.com/a.png").is_none());
        assert!(parse_data_url("data:image/png,plain").is_none());
    }

    #[test]
    fn thinking_maps_from_reasoning() {
        let enabled = RequestBody {
            reasoning: Some(Reasoning {
                enabled: Some(true),
                max_thinking_tokens: Some(2048),
                ..Default::default()
            }),
            ..body_with(vec![ChatMessage::user("hi")])
        };
        let thinking = Request::from_body(&enabled).thinking.unwrap();
        assert_eq!(thinking["type"], "enabled");
        assert_eq!(thinking["budget_tokens"], 2048);

        let disabled = body_with(vec![ChatMessage::user("hi")]);
        assert!(Request::from_body(&disabled).thinking.is_none());
    }

    #[test]
    fn assistant_role_preserved() {
        let req = Request::from_body(&body_with(vec![
            ChatMessage::user("q"),
            ChatMessage::assistant("a"),
        ]));
        assert_eq!(req.messages[0]["role"], "user");
        assert_eq!(req.messages[1]["role"], "assistant");
    }
}
