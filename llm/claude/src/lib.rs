//! Claude (Anthropic) Messages API streaming adapter.

use llm::reqwest::{Client, header::HeaderMap};
pub use request::Request;

mod provider;
mod request;
mod stream;

/// Anthropic API version header value.
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic endpoint URLs.
pub mod endpoint {
    /// Anthropic Messages endpoint.
    pub const ANTHROPIC: &str = "https://api.anthropic.com/v1/messages";
}

/// Claude provider.
#[derive(Clone)]
pub struct Claude {
    /// The HTTP client.
    pub client: Client,
    /// Request headers (`x-api-key`, version, content-type).
    headers: HeaderMap,
    /// Messages endpoint URL.
    endpoint: String,
}

impl Claude {
    /// Create an adapter targeting a custom Anthropic-compatible endpoint.
    pub fn custom(client: Client, key: &str, endpoint: &str) -> anyhow::Result<Self> {
        use llm::reqwest::header;
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse()?);
        headers.insert(header::ACCEPT, "text/event-stream".parse()?);
        headers.insert("x-api-key", key.parse()?);
        headers.insert("anthropic-version", API_VERSION.parse()?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Claude, endpoint};
    use llm::Provider;

    #[test]
    fn new_uses_default_endpoint() {
        let adapter = Claude::new(llm::Client::new(), "test-key").expect("adapter");
        assert_eq!(adapter.endpoint, endpoint::ANTHROPIC);
    }

    #[test]
    fn custom_constructor_sets_endpoint() {
        let custom = "http://localhost:9999/v1/messages";
        let adapter = Claude::custom(llm::Client::new(), "test-key", custom).expect("adapter");
        assert_eq!(adapter.endpoint, custom);
    }
}
