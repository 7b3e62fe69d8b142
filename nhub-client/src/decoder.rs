//! Decoding registration descriptions from hub responses.
//!
//! `PUT` answers with a single Atom `<entry>`, a listing answers with a
//! `<feed>` of entries. Each entry wraps one `*RegistrationDescription`
//! element whose children carry the registration fields.

use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use nhub_types::{Registration, DEFAULT_REGISTRATION_NAME};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

/// Parses a response body into registrations.
pub trait RegistrationDecoder: Send + Sync {
    /// Returns every registration found in `body`, in document order.
    fn decode(&self, body: &str) -> HubResult<Vec<Registration>>;
}

/// Decoder for the hub's Atom/XML registration descriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomRegistrationDecoder;

#[derive(Debug, Default)]
struct Fields {
    id: Option<String>,
    device_token: Option<String>,
    tags: Option<String>,
    etag: Option<String>,
    expiration: Option<String>,
    body_template: Option<String>,
    template_name: Option<String>,
}

impl Fields {
    fn set(&mut self, element: &str, value: String) {
        let slot = match element {
            "RegistrationId" => &mut self.id,
            "DeviceToken" => &mut self.device_token,
            "Tags" => &mut self.tags,
            "ETag" => &mut self.etag,
            "ExpirationTime" => &mut self.expiration,
            "BodyTemplate" => &mut self.body_template,
            "TemplateName" => &mut self.template_name,
            _ => return,
        };
        *slot = Some(value);
    }

    fn into_registration(self) -> HubResult<Registration> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HubError::Decode("registration without RegistrationId".to_string()))?;

        let name = self
            .template_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRATION_NAME.to_string());

        let expires_at = self.expiration.and_then(|raw| {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(t) => Some(t.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Ignoring unparseable ExpirationTime {:?}: {}", raw, e);
                    None
                }
            }
        });

        let mut registration = Registration::new(name, self.device_token.unwrap_or_default())
            .with_id(id)
            .with_tags(
                self.tags
                    .iter()
                    .flat_map(|t| t.split(','))
                    .map(str::trim)
                    .filter(|t| !t.is_empty()),
            );
        registration.etag = self.etag;
        registration.expires_at = expires_at;
        registration.body_template = self.body_template;
        Ok(registration)
    }
}

fn is_description(local_name: &str) -> bool {
    local_name.ends_with("RegistrationDescription")
}

impl RegistrationDecoder for AtomRegistrationDecoder {
    fn decode(&self, body: &str) -> HubResult<Vec<Registration>> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut registrations = Vec::new();
        let mut current: Option<Fields> = None;
        // Child element being read and its accumulated text.
        let mut field: Option<(String, String)> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(HubError::Decode(format!(
                        "malformed registration XML at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    if is_description(&name) {
                        current = Some(Fields::default());
                    } else if current.is_some() {
                        field = Some((name, String::new()));
                    }
                }
                Event::Text(text) => {
                    if let Some((_, buf)) = field.as_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| HubError::Decode(format!("bad text content: {e}")))?;
                        buf.push_str(&text);
                    }
                }
                Event::CData(cdata) => {
                    if let Some((_, buf)) = field.as_mut() {
                        buf.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    if is_description(&name) {
                        if let Some(fields) = current.take() {
                            registrations.push(fields.into_registration()?);
                        }
                    } else if let Some((element, value)) = field.take() {
                        if let Some(fields) = current.as_mut() {
                            fields.set(&element, value);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(registrations)
    }
}
