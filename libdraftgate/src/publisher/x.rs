//! X (Twitter) publisher
//!
//! Posts through the v2 `/2/tweets` endpoint, authenticated with OAuth
//! 1.0a user context: every request carries an HMAC-SHA1 signature over
//! the method, URL, and oauth parameters. Request bodies are JSON and are
//! not part of the signature base.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use tracing::{debug, info};

use crate::config::PublisherConfig;
use crate::error::{PublishError, Result};
use crate::publisher::Publisher;
use crate::types::Draft;

const TWEETS_URL: &str = "https://api.x.com/2/tweets";

pub struct XPublisher {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    access_token: String,
    access_secret: String,
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl XPublisher {
    /// Build from config. Missing credentials do not fail construction;
    /// they surface as a `Credentials` error when a publish is actually
    /// attempted, so verbs that never publish (reject, cancel, list) work
    /// without any X setup.
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.resolve_api_key().unwrap_or_default(),
            api_secret: config.resolve_api_secret().unwrap_or_default(),
            access_token: config.resolve_access_token().unwrap_or_default(),
            access_secret: config.resolve_access_secret().unwrap_or_default(),
        }
    }

    /// Build the `Authorization: OAuth ...` header for a request.
    fn oauth_header(&self, method: &str, url: &str, nonce: &str, timestamp: i64) -> String {
        let timestamp = timestamp.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", &self.api_key),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", &timestamp),
            ("oauth_token", &self.access_token),
            ("oauth_version", "1.0"),
        ];
        params.sort_by_key(|(k, _)| *k);

        let param_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!(
            "{}&{}&{}",
            method,
            percent_encode(url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.api_secret),
            percent_encode(&self.access_secret)
        );

        let signature = sign(&signing_key, &base);

        let mut header_params = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<Vec<_>>();
        header_params.push(("oauth_signature".to_string(), signature));
        header_params.sort_by(|(a, _), (b, _)| a.cmp(b));

        let fields = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        format!("OAuth {}", fields)
    }
}

/// HMAC-SHA1 over the signature base string, base64-encoded.
fn sign(key: &str, base: &str) -> String {
    use base64::Engine;

    // HMAC accepts keys of any length
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(base.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// RFC 3986 percent encoding with the unreserved set required by OAuth:
/// ALPHA / DIGIT / "-" / "." / "_" / "~".
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, draft: &Draft) -> Result<String> {
        if !self.is_configured() {
            return Err(PublishError::Credentials(
                "X credentials not configured; set [publisher] in config or the \
                 DRAFTGATE_X_* environment variables"
                    .to_string(),
            )
            .into());
        }

        let mut body = json!({ "text": draft.text });
        if !draft.media_refs.is_empty() {
            body["media"] = json!({ "media_ids": draft.media_refs });
        }

        let authorization = self.oauth_header(
            "POST",
            TWEETS_URL,
            &nonce(),
            chrono::Utc::now().timestamp(),
        );

        debug!(draft_id = %draft.id, "posting to {}", TWEETS_URL);
        let response = self
            .client
            .post(TWEETS_URL)
            .header("Authorization", authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Credentials(format!("{}: {}", status, text)).into());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|e| e.detail.or(e.title))
                .unwrap_or(text);
            return Err(PublishError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let parsed: TweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Network(format!("malformed response: {}", e)))?;

        info!(draft_id = %draft.id, post_id = %parsed.data.id, "published");
        Ok(parsed.data.id)
    }

    fn name(&self) -> &str {
        "x"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
            && !self.api_secret.is_empty()
            && !self.access_token.is_empty()
            && !self.access_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DraftgateError;
    use crate::types::ViewRef;

    fn publisher() -> XPublisher {
        XPublisher {
            client: reqwest::Client::new(),
            api_key: "consumer-key".to_string(),
            api_secret: "consumer-secret".to_string(),
            access_token: "access-token".to_string(),
            access_secret: "access-secret".to_string(),
        }
    }

    #[test]
    fn test_percent_encode_unreserved_passthrough() {
        assert_eq!(
            percent_encode("AZaz09-._~"),
            "AZaz09-._~"
        );
    }

    #[test]
    fn test_percent_encode_reserved() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("a&b=c"), "a%26b%3Dc");
        assert_eq!(percent_encode("https://api.x.com/2/tweets"), "https%3A%2F%2Fapi.x.com%2F2%2Ftweets");
    }

    #[test]
    fn test_percent_encode_utf8_bytes() {
        // Each UTF-8 byte is encoded separately
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_oauth_header_structure() {
        let header = publisher().oauth_header("POST", TWEETS_URL, "abc123", 1_700_000_000);

        assert!(header.starts_with("OAuth "));
        for field in [
            "oauth_consumer_key=\"consumer-key\"",
            "oauth_nonce=\"abc123\"",
            "oauth_signature_method=\"HMAC-SHA1\"",
            "oauth_timestamp=\"1700000000\"",
            "oauth_token=\"access-token\"",
            "oauth_version=\"1.0\"",
            "oauth_signature=\"",
        ] {
            assert!(header.contains(field), "missing {} in {}", field, header);
        }
    }

    #[test]
    fn test_oauth_signature_deterministic() {
        let p = publisher();
        let a = p.oauth_header("POST", TWEETS_URL, "nonce-1", 1_700_000_000);
        let b = p.oauth_header("POST", TWEETS_URL, "nonce-1", 1_700_000_000);
        let c = p.oauth_header("POST", TWEETS_URL, "nonce-2", 1_700_000_000);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_nonce_is_alphanumeric() {
        let n = nonce();
        assert_eq!(n.len(), 32);
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_is_configured() {
        assert!(publisher().is_configured());
    }

    #[test]
    fn test_from_config_resolves_explicit_credentials() {
        let p = XPublisher::from_config(&PublisherConfig {
            api_key: Some("k".to_string()),
            api_secret: Some("s".to_string()),
            access_token: Some("t".to_string()),
            access_secret: Some("ts".to_string()),
        });
        assert!(p.is_configured());
        assert_eq!(p.api_key, "k");
    }

    #[tokio::test]
    async fn test_publish_without_credentials_fails_before_network() {
        for var in [
            "DRAFTGATE_X_API_KEY",
            "DRAFTGATE_X_API_SECRET",
            "DRAFTGATE_X_ACCESS_TOKEN",
            "DRAFTGATE_X_ACCESS_SECRET",
        ] {
            std::env::remove_var(var);
        }
        let p = XPublisher::from_config(&PublisherConfig {
            api_key: None,
            api_secret: None,
            access_token: None,
            access_secret: None,
        });
        assert!(!p.is_configured());

        let d = Draft::new(
            "hello".to_string(),
            "U_AUTHOR".to_string(),
            vec![],
            None,
            ViewRef::new("cli", "-"),
        );
        let err = p.publish(&d).await.unwrap_err();
        assert!(matches!(
            err,
            DraftgateError::Publish(PublishError::Credentials(_))
        ));
    }
}
