//! Registration-name and tag syntax.

use crate::{Error, Result};

/// Name under which the native (non-template) registration is cached.
pub const DEFAULT_REGISTRATION_NAME: &str = "$Default";

/// Longest tag the hub accepts.
pub const MAX_TAG_LEN: usize = 120;

/// Checks that `name` can be used as a template registration name.
///
/// The reserved default name and names containing `:` are rejected.
pub fn validate_template_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("template name is empty".to_string()));
    }
    if name == DEFAULT_REGISTRATION_NAME {
        return Err(Error::InvalidName(format!(
            "{DEFAULT_REGISTRATION_NAME} is reserved for the native registration"
        )));
    }
    if name.contains(':') {
        return Err(Error::InvalidName(format!(
            "template name {name:?} must not contain ':'"
        )));
    }
    Ok(())
}

/// Checks a single tag against the hub's tag syntax.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::InvalidTag {
            tag: tag.to_string(),
            reason: "tag is empty",
        });
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(Error::InvalidTag {
            tag: tag.to_string(),
            reason: "tag is longer than 120 characters",
        });
    }
    if !tag.chars().all(is_tag_char) {
        return Err(Error::InvalidTag {
            tag: tag.to_string(),
            reason: "tag may only contain letters, digits and _@#.:-",
        });
    }
    Ok(())
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '.' | ':' | '-')
}
