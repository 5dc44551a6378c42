//! Proxy configuration from the environment.

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Notification sink URL; `None` disables notifications.
    pub ntfy_url: Option<String>,
}

impl Config {
    /// Read configuration from `PORT` and `NTFY_URL`.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let ntfy_url = std::env::var("NTFY_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());
        Self { port, ntfy_url }
    }

    /// The bind address for the listener.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            ntfy_url: None,
        }
    }
}
