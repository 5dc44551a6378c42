//! Canonical chat message shapes.
//!
//! Clients speak one message dialect to the proxy; each adapter translates
//! it to its upstream's own shape. Unknown keys on messages and parts are
//! carried through untouched so provider escape hatches survive the trip.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum Role {
    /// The user role.
    #[serde(rename = "user")]
    #[default]
    User,
    /// The assistant role.
    #[serde(rename = "assistant")]
    Assistant,
    /// The system role.
    #[serde(rename = "system")]
    System,
}

/// One part of a multimodal message body.
///
/// `type` is kept as a string rather than an enum: the set of part kinds
/// (`text`, `input_text`, `image_url`, `input_image`, `file`) differs per
/// upstream dialect and unknown kinds must pass through unmangled.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Part {
    /// Part kind discriminator.
    #[serde(rename = "type")]
    pub kind: CompactString,
    /// Text payload for text-like parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image reference: either a bare URL string or `{ "url": ... }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Value>,
    /// Any other keys, preserved verbatim.
    #[serde(flatten)]
    pub rest: BTreeMap<CompactString, Value>,
}

impl Part {
    /// Create a plain text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Whether this part carries text.
    pub fn is_text(&self) -> bool {
        matches!(self.kind.as_str(), "text" | "input_text")
    }

    /// Whether this part references an image.
    pub fn is_image(&self) -> bool {
        matches!(self.kind.as_str(), "image_url" | "input_image")
    }

    /// Whether this part attaches a file.
    pub fn is_file(&self) -> bool {
        self.kind.as_str() == "file"
    }

    /// Extract the image URL, accepting both the bare-string and the
    /// `{ "url": ... }` encodings.
    pub fn url(&self) -> Option<&str> {
        match self.image_url.as_ref()? {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("url").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Extract a file part's `data:` URL payload from
    /// `{ "file": { "file_data": ..., "filename": ... } }`.
    pub fn file_data(&self) -> Option<&str> {
        self.rest.get("file")?.get("file_data").and_then(Value::as_str)
    }

    /// Extract a file part's declared filename.
    pub fn filename(&self) -> Option<&str> {
        self.rest.get("file")?.get("filename").and_then(Value::as_str)
    }
}

/// Message content: a plain string or an ordered list of parts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content.
    Text(String),
    /// Multimodal content parts.
    Parts(Vec<Part>),
}

impl Content {
    /// Concatenate every text fragment in this content.
    pub fn joined_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether the content is purely textual: a plain string, or a part
    /// list with no non-text member.
    pub fn text_only(&self) -> bool {
        match self {
            Self::Text(_) => true,
            Self::Parts(parts) => parts.iter().all(Part::is_text),
        }
    }
}

/// A message in the chat.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    /// The role of the message.
    pub role: Role,
    /// The content of the message.
    pub content: Content,
    /// Any other keys, preserved verbatim.
    #[serde(flatten)]
    pub rest: BTreeMap<CompactString, Value>,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(content.into()),
            rest: BTreeMap::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(content.into()),
            rest: BTreeMap::new(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(content.into()),
            rest: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_deserializes_both_shapes() {
        let text: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert!(matches!(text.content, Content::Text(ref s) if s == "hi"));

        let parts: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":[{"type":"text","text":"hi"}]}"#,
        )
        .unwrap();
        assert!(matches!(parts.content, Content::Parts(ref p) if p.len() == 1));
    }

    #[test]
    fn part_url_accepts_string_and_object() {
        let bare = Part {
            kind: "image_url".into(),
            image_url: Some(serde_json::json!("https://example.com/a.png")),
            ..Default::default()
        };
        assert_eq!(bare.url().unwrap(), "https://example.com/a.png");

        let wrapped = Part {
            kind: "image_url".into(),
            image_url: Some(serde_json::json!({ "url": "data:image/png;base64,AAAA" })),
            ..Default::default()
        };
        assert_eq!(wrapped.url().unwrap(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn text_only_rejects_non_text_parts() {
        let plain = Content::Text("hi".to_owned());
        assert!(plain.text_only());

        let text_parts = Content::Parts(vec![Part::text("a"), Part::text("b")]);
        assert!(text_parts.text_only());

        let with_file: Content = serde_json::from_value(serde_json::json!([
            { "type": "text", "text": "a" },
            { "type": "file", "file": { "file_data": "data:application/pdf;base64,AA" } },
        ]))
        .unwrap();
        assert!(!with_file.text_only());
    }

    #[test]
    fn file_part_exposes_payload() {
        let part: Part = serde_json::from_str(
            r#"{"type":"file","file":{"filename":"notes.pdf","file_data":"data:application/pdf;base64,AAAA"}}"#,
        )
        .unwrap();
        assert!(part.is_file());
        assert_eq!(part.filename().unwrap(), "notes.pdf");
        assert_eq!(part.file_data().unwrap(), "data:application/pdf;base64,AAAA");

        let bare = Part::text("hi");
        assert!(!bare.is_file());
        assert!(bare.file_data().is_none());
    }

    #[test]
    fn unknown_keys_round_trip() {
        let raw = r#"{"role":"user","content":"hi","name":"alice"}"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.rest.get("name").unwrap(), "alice");

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["name"], "alice");
    }
}
