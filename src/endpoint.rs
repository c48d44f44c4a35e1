//! Authenticated request URL for the Nightscout `current` entry.

use sha1::{Digest, Sha1};

// ---

const CURRENT_ENTRY_PATH: &str = "/api/v1/entries/current.json";

/// Lowercase hex SHA-1 of the shared secret, as Nightscout expects it.
pub fn secret_digest(secret: &str) -> String {
    format!("{:x}", Sha1::digest(secret.as_bytes()))
}

/// Host plus secret, with the request URL derived from both.
///
/// The URL is rebuilt on every mutation, so it can never lag behind the
/// host or secret it was derived from.
#[derive(Clone)]
pub struct Endpoint {
    // ---
    host: String,
    secret: String,
    request_url: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, secret: impl Into<String>) -> Self {
        // ---
        let mut endpoint = Endpoint {
            host: host.into(),
            secret: secret.into(),
            request_url: String::new(),
        };
        endpoint.rebuild();
        endpoint
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
        self.rebuild();
    }

    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = secret.into();
        self.rebuild();
    }

    /// Request URL with the digest masked, safe to log.
    pub fn redacted_url(&self) -> String {
        format!("{}{}?secret=****", self.base(), CURRENT_ENTRY_PATH)
    }

    fn base(&self) -> &str {
        self.host.trim_end_matches('/')
    }

    fn rebuild(&mut self) {
        // ---
        self.request_url = format!(
            "{}{}?secret={}",
            self.base(),
            CURRENT_ENTRY_PATH,
            secret_digest(&self.secret)
        );
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("request_url", &self.redacted_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_secret_digest_is_lowercase_sha1() {
        // ---
        assert_eq!(
            secret_digest("abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(secret_digest(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_request_url_never_contains_plain_secret() {
        // ---
        let endpoint = Endpoint::new("https://cgm.example.com", "hunter2hunter2");
        assert!(!endpoint.request_url().contains("hunter2"));
        assert_eq!(
            endpoint.request_url(),
            format!(
                "https://cgm.example.com/api/v1/entries/current.json?secret={}",
                secret_digest("hunter2hunter2")
            )
        );
    }

    #[test]
    fn test_url_recomputed_on_change() {
        // ---
        let mut endpoint = Endpoint::new("https://a.example.com/", "abc");
        assert!(endpoint
            .request_url()
            .starts_with("https://a.example.com/api/v1/"));

        endpoint.set_host("https://b.example.com");
        assert!(endpoint
            .request_url()
            .starts_with("https://b.example.com/api/v1/"));

        endpoint.set_secret("def");
        assert!(endpoint.request_url().ends_with(&secret_digest("def")));
        assert_eq!(endpoint.host(), "https://b.example.com");
    }

    #[test]
    fn test_redacted_url_hides_digest() {
        // ---
        let endpoint = Endpoint::new("https://cgm.example.com", "abc");
        let shown = endpoint.redacted_url();
        assert!(!shown.contains(&secret_digest("abc")));
        assert!(!format!("{:?}", endpoint).contains(&secret_digest("abc")));
    }
}
