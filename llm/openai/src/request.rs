//! Request body translation for the OpenAI Responses API.

use compact_str::CompactString;
use llm::{Content, Part, RequestBody, Role};
use serde::Serialize;
use serde_json::{Value, json};

/// The request body for the OpenAI Responses API.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// The model identifier.
    pub model: CompactString,
    /// Conversation input: a bare string for the single-message text-only
    /// case, otherwise a list of role/content turns.
    pub input: Value,
    /// Whether to stream the response.
    pub stream: bool,
    /// Maximum output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    /// Temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    /// Top-p sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Value>,
    /// Reasoning effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
    /// Text output controls (verbosity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
}

impl Request {
    /// Translate a normalized body into the Responses dialect.
    pub fn from_body(body: &RequestBody) -> Self {
        let input = match body.messages.as_slice() {
            [only] if only.content.text_only() => Value::String(only.content.joined_text()),
            messages => Value::Array(messages.iter().map(turn_for).collect()),
        };

        let reasoning = body
            .reasoning
            .as_ref()
            .and_then(|r| r.effort.clone())
            .map(|effort| json!({ "effort": effort }));

        Self {
            model: body.model.clone(),
            input,
            stream: true,
            max_output_tokens: body.max_tokens,
            temperature: body.temperature.clone(),
            top_p: body.top_p.clone(),
            reasoning,
            text: body
                .verbosity
                .clone()
                .map(|verbosity| json!({ "verbosity": verbosity })),
        }
    }
}

fn turn_for(message: &llm::ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let parts: Vec<Value> = match &message.content {
        Content::Text(text) => vec![json!({ "type": "input_text", "text": text })],
        Content::Parts(parts) => parts.iter().filter_map(part_for).collect(),
    };
    json!({ "role": role, "content": parts })
}

fn part_for(part: &Part) -> Option<Value> {
    if part.is_text() {
        Some(json!({ "type": "input_text", "text": part.text.clone()? }))
    } else if part.is_image() {
        Some(json!({ "type": "input_image", "image_url": part.url()? }))
    } else if part.is_file() {
        let mut input = json!({ "type": "input_file", "file_data": part.file_data()? });
        if let Some(filename) = part.filename() {
            input["filename"] = filename.into();
        }
        Some(input)
    } else {
        None
    }
}
