//! Kraken REST Client
//!
//! Public endpoints are plain GETs. Private endpoints are form-encoded POSTs
//! signed with `API-Sign = base64(HMAC-SHA512(base64decode(secret),
//! path + SHA256(nonce + body)))`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::HeaderValue;
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::ports::exchange::ExchangeError;
use super::types::KrakenResponse;

type HmacSha512 = Hmac<Sha512>;

const API_VERSION: &str = "0";

/// Kraken client configuration
#[derive(Clone)]
pub struct KrakenConfig {
    /// Base URL for the REST API
    pub api_base_url: String,
    /// Request timeout
    pub timeout: Duration,
    pub api_key: Option<String>,
    /// Base64-encoded private key
    pub api_secret: Option<String>,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.kraken.com".to_string(),
            timeout: Duration::from_secs(30),
            api_key: None,
            api_secret: None,
        }
    }
}

impl std::fmt::Debug for KrakenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenConfig")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Strictly increasing nonce seeded from the microsecond clock
#[derive(Debug, Default)]
struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    fn next(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(current + 1);
            match self
                .last
                .compare_exchange(current, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Kraken REST client, cheap to clone
#[derive(Debug, Clone)]
pub struct KrakenClient {
    config: KrakenConfig,
    http: Client,
    nonce: Arc<NonceGenerator>,
}

impl KrakenClient {
    /// Create a client for public endpoints only
    pub fn new() -> Result<Self, ExchangeError> {
        Self::with_config(KrakenConfig::default())
    }

    pub fn with_config(config: KrakenConfig) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            nonce: Arc::new(NonceGenerator::default()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some() && self.config.api_secret.is_some()
    }

    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    /// Call a public endpoint
    pub async fn public<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T, ExchangeError> {
        let url = format!("{}/{}/public/{}", self.config.api_base_url, API_VERSION, method);
        debug!("Kraken public {} {:?}", method, params);

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    /// Call a signed private endpoint. A fresh nonce is prepended to `params`.
    pub async fn private<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T, ExchangeError> {
        let (api_key, api_secret) = match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                return Err(ExchangeError::MissingCredentials(
                    "KRAKEN_KEY and KRAKEN_SECRET must be set for private endpoints".into(),
                ))
            }
        };

        let path = format!("/{}/private/{}", API_VERSION, method);
        let url = format!("{}{}", self.config.api_base_url, path);
        let nonce = self.nonce.next();

        let mut form: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        form.push(("nonce", nonce.to_string()));
        form.extend(params.iter().cloned());

        // Build first so the signature covers the exact encoded body
        let mut request = self
            .http
            .post(&url)
            .form(&form)
            .build()
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();

        let signature = sign(&path, nonce, &body, api_secret)?;
        let headers = request.headers_mut();
        headers.insert(
            "api-key",
            api_key
                .parse::<HeaderValue>()
                .map_err(|_| ExchangeError::MissingCredentials("API key is not a valid header value".into()))?,
        );
        headers.insert(
            "api-sign",
            signature
                .parse::<HeaderValue>()
                .map_err(|_| ExchangeError::Parse("signature is not a valid header value".into()))?,
        );

        debug!("Kraken private {} (nonce {})", method, nonce);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ExchangeError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        // Kraken reports most failures inside a 200 envelope
        match serde_json::from_str::<KrakenResponse<T>>(&text) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(ExchangeError::Http(format!("HTTP {}: {}", status, text))),
            Err(e) => Err(ExchangeError::Parse(format!("Failed to parse response: {}", e))),
        }
    }
}

/// Compute the `API-Sign` header value
pub fn sign(path: &str, nonce: u64, body: &str, secret: &str) -> Result<String, ExchangeError> {
    let key = BASE64
        .decode(secret)
        .map_err(|e| ExchangeError::MissingCredentials(format!("API secret is not valid base64: {}", e)))?;

    let mut sha = Sha256::new();
    sha.update(nonce.to_string().as_bytes());
    sha.update(body.as_bytes());
    let digest = sha.finalize();

    let mut mac = HmacSha512::new_from_slice(&key)
        .map_err(|e| ExchangeError::MissingCredentials(format!("Invalid API secret: {}", e)))?;
    mac.update(path.as_bytes());
    mac.update(&digest);

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_reference_vector() {
        let secret = "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";
        let body = "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25";

        let signature = sign("/0/private/AddOrder", 1616492376594, body, secret).unwrap();
        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb0nmbRn6H8ndwLUQ=="
        );
    }

    #[test]
    fn test_signature_rejects_bad_secret() {
        assert!(matches!(
            sign("/0/private/Balance", 1, "nonce=1", "not base64!"),
            Err(ExchangeError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_nonce_strictly_increases() {
        let generator = NonceGenerator::default();
        let mut previous = generator.next();
        for _ in 0..1000 {
            let next = generator.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[tokio::test]
    async fn test_private_requires_credentials() {
        let client = KrakenClient::new().unwrap();
        assert!(!client.has_credentials());
        let result: Result<serde_json::Value, _> = client.private("Balance", &[]).await;
        assert!(matches!(result, Err(ExchangeError::MissingCredentials(_))));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = KrakenConfig {
            api_key: Some("key".into()),
            api_secret: Some("secret".into()),
            ..KrakenConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret\""));
        assert!(printed.contains("<redacted>"));
    }
}
