//! Request body translation for the GenerativeLanguage API.
//!
//! Gemini knows two roles (`user` and `model`), rejects consecutive turns
//! of the same role, and wants generation knobs under `generationConfig`.
//! JSON mode rides on `responseMimeType` plus a schema whose `type` leaves
//! are upper-case where the OpenAI convention uses lower-case.

use llm::{Content, Part, RequestBody, Role};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// The request body for `models/<model>:streamGenerateContent`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Merged conversation turns.
    pub contents: Vec<Value>,
    /// Generation knobs, omitted when empty.
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    /// Provider tools (web search for `:online` models).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
}

impl Request {
    /// Translate a normalized body into the Gemini dialect. `online`
    /// enables the provider's web-search tool.
    pub fn from_body(body: &RequestBody, online: bool) -> Self {
        let mut merged: Vec<(&str, Vec<Value>)> = Vec::new();
        for message in &body.messages {
            let role = match message.role {
                Role::Assistant => "model",
                _ => "user",
            };
            let parts = parts_for(&message.content);
            match merged.last_mut() {
                Some((last_role, last_parts)) if *last_role == role => last_parts.extend(parts),
                _ => merged.push((role, parts)),
            }
        }
        // The API refuses a conversation that ends on the model's turn.
        if merged.last().is_some_and(|(role, _)| *role != "user") {
            merged.pop();
        }

        let contents = merged
            .into_iter()
            .map(|(role, parts)| json!({ "role": role, "parts": parts }))
            .collect();

        Self {
            contents,
            generation_config: generation_config(body),
            tools: online.then(|| json!([{ "google_search": {} }])),
        }
    }
}

/// Split a `:online` suffix off a model name.
pub fn split_online(model: &str) -> (&str, bool) {
    match model.strip_suffix(":online") {
        Some(base) => (base, true),
        None => (model, false),
    }
}

fn parts_for(content: &Content) -> Vec<Value> {
    match content {
        Content::Text(text) => vec![json!({ "text": text })],
        Content::Parts(parts) => parts.iter().filter_map(part_for).collect(),
    }
}

fn part_for(part: &Part) -> Option<Value> {
    if part.is_text() {
        Some(json!({ "text": part.text.clone()? }))
    } else if part.is_image() {
        inline_data(part.url()?)
    } else if part.is_file() {
        inline_data(part.file_data()?)
    } else {
        None
    }
}

/// Translate a `data:` URL into an inline blob part. Images and file
/// attachments share this encoding upstream.
fn inline_data(url: &str) -> Option<Value> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some(json!({ "inlineData": { "mimeType": mime, "data": data } }))
}

fn generation_config(body: &RequestBody) -> Option<Value> {
    let mut config = Map::new();
    if let Some(temperature) = body.temperature.clone() {
        config.insert("temperature".to_owned(), temperature);
    }
    if let Some(top_p) = body.top_p.clone() {
        config.insert("topP".to_owned(), top_p);
    }
    if let Some(max_tokens) = body.max_tokens {
        config.insert("maxOutputTokens".to_owned(), max_tokens.into());
    }
    if let Some(format) = body.response_format.as_ref()
        && format
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.starts_with("json"))
    {
        config.insert(
            "responseMimeType".to_owned(),
            json!("application/json"),
        );
        let schema = format
            .get("json_schema")
            .and_then(|j| j.get("schema"))
            .or_else(|| format.get("schema"));
        if let Some(schema) = schema {
            config.insert("responseSchema".to_owned(), uppercase_types(schema.clone()));
        }
    }
    (!config.is_empty()).then(|| Value::Object(config))
}

/// Recursively upper-case string-valued `type` keys in a JSON schema.
/// Everything else passes through verbatim.
fn uppercase_types(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| match (key.as_str(), value) {
                    ("type", Value::String(t)) => (key, Value::String(t.to_uppercase())),
                    (_, value) => (key, uppercase_types(value)),
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(uppercase_types).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::ChatMessage;
    use serde_json::json;

    fn body_with(messages: Vec<ChatMessage>) -> RequestBody {
        RequestBody {
            model: "gemini-pro".into(),
            messages,
            stream: true,
            ..Default::default()
        }
    }

    #[test]
    fn roles_map_and_merge() {
        let req = Request::from_body(
            &body_with(vec![
                ChatMessage::system("rules"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("more"),
            ]),
            false,
        );
        // system + user collapse into one user turn.
        assert_eq!(req.contents.len(), 3);
        assert_eq!(req.contents[0]["role"], "user");
        assert_eq!(req.contents[0]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(req.contents[1]["role"], "model");
        assert_eq!(req.contents[2]["role"], "user");
    }

    #[test]
    fn trailing_model_turn_dropped() {
        let req = Request::from_body(
            &body_with(vec![ChatMessage::user("hi"), ChatMessage::assistant("yo")]),
            false,
        );
        assert_eq!(req.contents.len(), 1);
        assert_eq!(req.contents[0]["role"], "user");
    }

    #[test]
    fn online_suffix_splits() {
        assert_eq!(split_online("gemini-pro:online"), ("gemini-pro", true));
        assert_eq!(split_online("gemini-pro"), ("gemini-pro", false));
    }

    #[test]
    fn online_enables_search_tool() {
        let req = Request::from_body(&body_with(vec![ChatMessage::user("hi")]), true);
        assert_eq!(req.tools.unwrap()[0]["google_search"], json!({}));
    }

    #[test]
    fn json_mode_sets_mime_and_uppercases_schema() {
        let body = RequestBody {
            response_format: Some(json!({
                "type": "json_schema",
                "json_schema": { "schema": {
                    "type": "object",
                    "properties": { "xs": { "type": "array", "items": { "type": "string" } } },
                }},
            })),
            ..body_with(vec![ChatMessage::user("hi")])
        };
        let config = Request::from_body(&body, false).generation_config.unwrap();
        assert_eq!(config["responseMimeType"], "application/json");
        let schema = &config["responseSchema"];
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["xs"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["xs"]["items"]["type"], "STRING");
    }

    #[test]
    fn non_json_format_ignored() {
        let body = RequestBody {
            response_format: Some(json!({ "type": "text" })),
            ..body_with(vec![ChatMessage::user("hi")])
        };
        assert!(Request::from_body(&body, false).generation_config.is_none());
    }

    #[test]
    fn data_url_becomes_inline_data() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                { "type": "text", "text": "see" },
                { "type": "image_url", "image_url": "data:image/jpeg;base64,QQ==" },
            ],
        }))
        .unwrap();
        let req = Request::from_body(&body_with(vec![message]), false);
        let parts = req.contents[0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "QQ==");
    }

    #[test]
    fn file_part_becomes_inline_data() {
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
        let req = Request::from_body(&body_with(vec![message]), false);
        let parts = req.contents[0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["inlineData"]["data"], "UERG");
    }

    #[test]
    fn generation_knobs_collect() {
        let body = RequestBody {
            temperature: Some(json!(0.5)),
            top_p: Some(json!(0.9)),
            max_tokens: Some(256),
            ..body_with(vec![ChatMessage::user("hi")])
        };
        let config = Request::from_body(&body, false).generation_config.unwrap();
        assert_eq!(config["temperature"], 0.5);
        assert_eq!(config["topP"], 0.9);
        assert_eq!(config["maxOutputTokens"], 256);
    }
}
