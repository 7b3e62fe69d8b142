//! Authorization tokens.
//!
//! Every request carries an `Authorization` header obtained from a
//! [`TokenProvider`]. The default provider signs shared access signatures
//! with the key from the connection string.

use crate::config::ConnectionString;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a freshly minted signature.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60);

/// A cached signature is reminted once it is this close to expiry.
const REFRESH_MARGIN_SECS: u64 = 5 * 60;

/// Source of `Authorization` header values.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token valid for `url`, or `None` if none can be produced.
    async fn token(&self, url: &Url) -> Option<String>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Shared access signature provider.
pub struct SasTokenProvider {
    key_name: String,
    key: String,
    lifetime: Duration,
    /// Signatures by audience.
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl SasTokenProvider {
    /// Creates a provider for the given policy name and key.
    pub fn new(key_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            key: key.into(),
            lifetime: DEFAULT_TOKEN_LIFETIME,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a provider from a parsed connection string.
    pub fn from_connection_string(connection: &ConnectionString) -> Self {
        Self::new(connection.key_name.clone(), connection.key.clone())
    }

    /// Overrides the signature lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Signs `url` with an explicit expiry (seconds since the Unix epoch).
    pub fn sign(&self, url: &Url, expiry: u64) -> Option<String> {
        let audience = urlencoding::encode(&audience(url)).into_owned();
        let string_to_sign = format!("{audience}\n{expiry}");

        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes()).ok()?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Some(format!(
            "SharedAccessSignature sr={audience}&sig={}&se={expiry}&skn={}",
            urlencoding::encode(&signature),
            urlencoding::encode(&self.key_name)
        ))
    }

    fn token_at(&self, url: &Url, now: u64) -> Option<String> {
        let audience = audience(url);
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = tokens.get(&audience) {
            if cached.expires_at > now + REFRESH_MARGIN_SECS {
                return Some(cached.value.clone());
            }
        }

        let expires_at = now + self.lifetime.as_secs();
        let value = self.sign(url, expires_at)?;
        debug!("Minted SAS token for {} (expires at {})", audience, expires_at);
        tokens.insert(
            audience,
            CachedToken {
                value: value.clone(),
                expires_at,
            },
        );
        Some(value)
    }
}

#[async_trait]
impl TokenProvider for SasTokenProvider {
    async fn token(&self, url: &Url) -> Option<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.token_at(url, now)
    }
}

/// Lower-cased URL without query or fragment.
fn audience(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.as_str().to_ascii_lowercase()
}
