//! Device tokens.
//!
//! The push service hands the app an opaque byte string. The hub expects it
//! as upper-case hex, which is the only form stored or sent.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A device token in canonical upper-case hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceToken(String);

impl DeviceToken {
    /// Encodes raw token bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidDeviceToken("token is empty".to_string()));
        }
        Ok(Self(hex::encode_upper(bytes)))
    }

    /// Parses a textual token.
    ///
    /// Accepts the bracketed, space-separated form some platforms print
    /// (`<a1b2 c3d4>`) as well as bare hex in either case.
    pub fn parse(s: &str) -> Result<Self> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '<' && *c != '>')
            .collect();

        if cleaned.is_empty() {
            return Err(Error::InvalidDeviceToken("token is empty".to_string()));
        }
        hex::decode(&cleaned).map_err(|e| Error::InvalidDeviceToken(format!("{s:?}: {e}")))?;

        Ok(Self(cleaned.to_ascii_uppercase()))
    }

    /// Returns the hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes back to raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Construction guarantees valid hex.
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DeviceToken> for String {
    fn from(token: DeviceToken) -> Self {
        token.0
    }
}

impl AsRef<str> for DeviceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
