//! Client-facing ingress: origin policy, CORS, uid normalization, and the
//! WebSocket session loop.

use compact_str::CompactString;
use llm::reqwest::Url;

pub mod ws;

/// Hostnames allowed to present an `Origin` header, besides `*.github.io`.
const ALLOWED_HOSTS: [&str; 2] = ["sune.planetrenox.com", "sune.chat"];

/// Normalize a raw `uid` query value: keep `[A-Za-z0-9_-]`, cap at 64
/// characters. `None` when nothing usable remains.
pub(crate) fn sanitize_uid(raw: &str) -> Option<CompactString> {
    let uid: CompactString = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .take(64)
        .collect();
    (!uid.is_empty()).then_some(uid)
}

/// Whether an `Origin` header value names an allowed host.
pub(crate) fn origin_allowed(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    ALLOWED_HOSTS.contains(&host) || host.ends_with(".github.io")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_keeps_safe_chars_only() {
        assert_eq!(sanitize_uid("user_1-a").unwrap(), "user_1-a");
        assert_eq!(sanitize_uid("a b/c?").unwrap(), "abc");
        assert!(sanitize_uid("").is_none());
        assert!(sanitize_uid("!!!").is_none());
    }

    #[test]
    fn uid_truncates_to_64() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_uid(&long).unwrap().len(), 64);
    }

    #[test]
    fn known_origins_allowed() {
        assert!(origin_allowed("https://sune.chat"));
        assert!(origin_allowed("https://sune.planetrenox.com"));
        assert!(origin_allowed("https://someone.github.io"));
    }

    #[test]
    fn unknown_origins_rejected() {
        assert!(!origin_allowed("https://evil.example.com"));
        assert!(!origin_allowed("https://sune.chat.evil.com"));
        assert!(!origin_allowed("https://github.io.evil.com"));
        assert!(!origin_allowed("not a url"));
    }
}
