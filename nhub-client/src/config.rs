//! Connection strings and hub URLs.
//!
//! A connection string looks like
//! `Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>`.
//! Keys are matched case-insensitively and values may themselves contain `=`
//! (base64 keys usually do).

use crate::error::{HubError, HubResult};
use reqwest::Url;
use std::fmt;
use std::str::FromStr;

/// REST API version spoken by this client.
pub const API_VERSION: &str = "2013-04";

/// Parsed hub connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Namespace endpoint, always `http` or `https`.
    pub endpoint: Url,
    /// Name of the shared access policy.
    pub key_name: String,
    /// Base64 shared access key.
    pub key: String,
}

impl ConnectionString {
    /// Parses a connection string.
    pub fn parse(s: &str) -> HubResult<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                HubError::InvalidConnectionString(format!("segment {part:?} has no '='"))
            })?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                // Unknown segments (e.g. EntityPath) are ignored.
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| HubError::InvalidConnectionString("missing Endpoint".to_string()))?;
        let key_name = key_name.filter(|v| !v.is_empty()).ok_or_else(|| {
            HubError::InvalidConnectionString("missing SharedAccessKeyName".to_string())
        })?;
        let key = key.filter(|v| !v.is_empty()).ok_or_else(|| {
            HubError::InvalidConnectionString("missing SharedAccessKey".to_string())
        })?;

        Ok(Self {
            endpoint: parse_endpoint(&endpoint)?,
            key_name,
            key,
        })
    }
}

impl FromStr for ConnectionString {
    type Err = HubError;

    fn from_str(s: &str) -> HubResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("key_name", &self.key_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn parse_endpoint(raw: &str) -> HubResult<Url> {
    // Service Bus hands out `sb://` endpoints; the REST surface is https.
    let normalized = match raw.strip_prefix("sb://") {
        Some(rest) => format!("https://{rest}"),
        None => raw.to_string(),
    };

    let url = Url::parse(&normalized)
        .map_err(|e| HubError::InvalidConnectionString(format!("bad Endpoint {raw:?}: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(HubError::InvalidConnectionString(format!(
            "Endpoint {raw:?} must be an sb, http or https URL"
        ))),
    }
}

/// URLs of the registration resources of one hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoints {
    base: String,
}

impl HubEndpoints {
    /// Resolves the URLs for `hub_path` under `endpoint`.
    pub fn new(endpoint: &Url, hub_path: &str) -> HubResult<Self> {
        let hub_path = hub_path.trim().trim_matches('/');
        if hub_path.is_empty() {
            return Err(HubError::InvalidHubPath("hub path is empty".to_string()));
        }
        if hub_path.contains(|c: char| c == '?' || c == '#') {
            return Err(HubError::InvalidHubPath(format!(
                "{hub_path:?} must not contain '?' or '#'"
            )));
        }

        Ok(Self {
            base: format!("{}/{}", endpoint.as_str().trim_end_matches('/'), hub_path),
        })
    }

    /// `POST` target that allocates a new registration id.
    pub fn registration_ids(&self) -> HubResult<Url> {
        self.url(format!("{}/registrationids/?api-version={API_VERSION}", self.base))
    }

    /// `PUT`/`DELETE` target for one registration.
    pub fn registration(&self, id: &str) -> HubResult<Url> {
        self.url(format!(
            "{}/Registrations/{}?api-version={API_VERSION}",
            self.base,
            urlencoding::encode(id)
        ))
    }

    /// `GET` query listing every registration bound to `device_token`.
    pub fn registrations_for_token(&self, device_token: &str) -> HubResult<Url> {
        self.url(format!(
            "{}/Registrations/?$filter=deviceToken+eq+'{}'&api-version={API_VERSION}",
            self.base,
            urlencoding::encode(device_token)
        ))
    }

    fn url(&self, raw: String) -> HubResult<Url> {
        Url::parse(&raw).map_err(|e| HubError::unknown(format!("invalid request URL {raw:?}: {e}")))
    }
}
