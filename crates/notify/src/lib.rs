//! Best-effort text notifications over ntfy.
//!
//! Fire-and-forget: delivery failures are logged and otherwise ignored.
//! With no sink URL configured, notifications are silently dropped.

use reqwest::Client;

/// Notification title sent with every message.
const TITLE: &str = "Sune Proxy";

/// Handle to an ntfy-compatible notification sink.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    url: Option<String>,
}

impl Notifier {
    /// Create a notifier. An empty or missing URL disables delivery.
    pub fn new(client: Client, url: Option<String>) -> Self {
        let url = url.filter(|u| !u.trim().is_empty());
        Self { client, url }
    }

    /// Whether a sink is configured.
    pub fn enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Send one message. Errors are logged only.
    pub async fn send(&self, text: &str, priority: u8, tags: &str) {
        let Some(url) = self.url.as_deref() else {
            return;
        };
        let result = self
            .client
            .post(url)
            .header("Title", TITLE)
            .header("Priority", priority.to_string())
            .header("Tags", tags)
            .body(text.to_owned())
            .send()
            .await;
        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("notification rejected: {}", response.status());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("notification failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_disables() {
        assert!(!Notifier::new(Client::new(), None).enabled());
        assert!(!Notifier::new(Client::new(), Some("  ".to_string())).enabled());
        assert!(Notifier::new(Client::new(), Some("http://ntfy.local/t".to_string())).enabled());
    }

    #[tokio::test]
    async fn disabled_send_is_a_no_op() {
        let notifier = Notifier::new(Client::new(), None);
        notifier.send("hello", 3, "tada").await;
    }
}
