//! Google GenerativeLanguage (Gemini) streaming adapter.

use llm::reqwest::{Client, header::HeaderMap};
pub use request::Request;

mod provider;
mod request;

/// Google endpoint URLs.
pub mod endpoint {
    /// GenerativeLanguage models base URL; the model name and
    /// `:streamGenerateContent` verb are appended per request.
    pub const GOOGLE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
}

/// Gemini provider.
#[derive(Clone)]
pub struct Gemini {
    /// The HTTP client.
    pub client: Client,
    /// Request headers (`x-goog-api-key`, content-type).
    headers: HeaderMap,
    /// Models base URL.
    base: String,
}

impl Gemini {
    /// Create an adapter targeting a custom GenerativeLanguage base URL.
    pub fn custom(client: Client, key: &str, base: &str) -> anyhow::Result<Self> {
        use llm::reqwest::header;
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse()?);
        headers.insert(header::ACCEPT, "text/event-stream".parse()?);
        headers.insert("x-goog-api-key", key.parse()?);
        Ok(Self {
            client,
            headers,
            base: base.trim_end_matches('/').to_owned(),
        })
    }

    /// The streaming URL for a model.
    fn stream_url(&self, model: &str) -> String {
        format!("{}/{model}:streamGenerateContent?alt=sse", self.base)
    }
}
