//! OpenAI Responses API streaming adapter.

use llm::reqwest::{Client, header::HeaderMap};
pub use request::Request;

mod provider;
mod request;
mod stream;

/// OpenAI endpoint URLs.
pub mod endpoint {
    /// OpenAI Responses endpoint.
    pub const OPENAI: &str = "https://api.openai.com/v1/responses";
}

/// OpenAI provider.
#[derive(Clone)]
pub struct OpenAi {
    /// The HTTP client.
    pub client: Client,
    /// Request headers (authorization, content-type).
    headers: HeaderMap,
    /// Responses endpoint URL.
    endpoint: String,
}

impl OpenAi {
    /// Create an adapter targeting a custom OpenAI-compatible endpoint.
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
    use super::{OpenAi, endpoint};
    use llm::Provider;

    #[test]
    fn new_uses_default_endpoint() {
        let adapter = OpenAi::new(llm::Client::new(), "test-key").expect("adapter");
        assert_eq!(adapter.endpoint, endpoint::OPENAI);
    }

    #[test]
    fn custom_constructor_sets_endpoint() {
        let custom = "http://localhost:9999/v1/responses";
        let adapter = OpenAi::custom(llm::Client::new(), "test-key", custom).expect("adapter");
        assert_eq!(adapter.endpoint, custom);
    }
}
