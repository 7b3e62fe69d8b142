//! Registration descriptors sent as request bodies.
//!
//! The engine treats payloads as opaque strings; these builders produce the
//! Atom entries the hub expects for native and template registrations.

use crate::error::HubResult;
use nhub_types::{validate_tag, validate_template_name, DeviceToken};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const ENTRY_OPEN: &str = r#"<?xml version="1.0" encoding="utf-8"?><entry xmlns="http://www.w3.org/2005/Atom"><content type="application/xml">"#;
const ENTRY_CLOSE: &str = "</content></entry>";
const DESCRIPTION_NAMESPACES: &str = r#"xmlns:i="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect""#;

/// A desired template registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRegistration {
    /// Local name of the registration.
    pub name: String,
    /// Notification body with `$(property)` placeholders, sent verbatim.
    pub body_template: String,
    /// Optional expiry expression.
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TemplateRegistration {
    pub fn new(name: impl Into<String>, body_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body_template: body_template.into(),
            expiry: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Builds the descriptor for a native registration.
pub fn native_payload(device_token: &DeviceToken, tags: &[String]) -> HubResult<String> {
    let tags = tags_element(tags)?;
    Ok(format!(
        "{ENTRY_OPEN}<AppleRegistrationDescription {DESCRIPTION_NAMESPACES}>{tags}\
         <DeviceToken>{}</DeviceToken></AppleRegistrationDescription>{ENTRY_CLOSE}",
        escape(device_token.as_str())
    ))
}

/// Builds the descriptor for a template registration.
pub fn template_payload(
    device_token: &DeviceToken,
    template: &TemplateRegistration,
) -> HubResult<String> {
    validate_template_name(&template.name)?;
    let tags = tags_element(&template.tags)?;
    let expiry = template
        .expiry
        .as_deref()
        .map(|e| format!("<Expiry>{}</Expiry>", escape(e)))
        .unwrap_or_default();

    Ok(format!(
        "{ENTRY_OPEN}<AppleTemplateRegistrationDescription {DESCRIPTION_NAMESPACES}>{tags}\
         <DeviceToken>{}</DeviceToken><BodyTemplate>{}</BodyTemplate>{expiry}\
         <TemplateName>{}</TemplateName></AppleTemplateRegistrationDescription>{ENTRY_CLOSE}",
        escape(device_token.as_str()),
        cdata(&template.body_template),
        escape(template.name.as_str())
    ))
}

fn tags_element(tags: &[String]) -> HubResult<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        validate_tag(tag)?;
        unique.insert(tag.as_str());
    }
    if unique.is_empty() {
        return Ok(String::new());
    }
    let joined = unique.into_iter().collect::<Vec<_>>().join(",");
    Ok(format!("<Tags>{}</Tags>", escape(joined.as_str())))
}

/// Wraps text in CDATA, splitting any embedded terminator.
fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}
