//! OpenRouter LLM provider adapter.
//!
//! The default upstream. The normalized request body already is OpenRouter's
//! chat completions shape, so it is forwarded verbatim and never mutated.

use llm::reqwest::{Client, header::HeaderMap};

mod provider;

/// OpenRouter endpoint URLs.
pub mod endpoint {
    /// OpenRouter chat completions endpoint.
    pub const OPENROUTER: &str = "https://openrouter.ai/api/v1/chat/completions";
}

/// OpenRouter provider.
#[derive(Clone)]
pub struct OpenRouter {
    /// The HTTP client.
    pub client: Client,
    /// Request headers (authorization, content-type).
    headers: HeaderMap,
    /// Chat completions endpoint URL.
    endpoint: String,
}

impl OpenRouter {
    /// Create an adapter targeting a custom OpenRouter-compatible endpoint.
    pub fn custom(client: Client, key: &str, endpoint: &str) -> anyhow::Result<Self> {
        use llm::reqwest::header;
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse()?);
        headers.insert(header::ACCEPT, "text/event-stream".parse()?);
        headers.insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{OpenRouter, endpoint};
    use llm::Provider;

    #[test]
    fn new_uses_default_endpoint() {
        let adapter = OpenRouter::new(llm::Client::new(), "test-key").expect("adapter");
        assert_eq!(adapter.endpoint, endpoint::OPENROUTER);
    }

    #[test]
    fn custom_constructor_sets_endpoint() {
        let custom = "http://localhost:9999/v1/chat/completions";
        let adapter = OpenRouter::custom(llm::Client::new(), "test-key", custom).expect("adapter");
        assert_eq!(adapter.endpoint, custom);
    }
}
