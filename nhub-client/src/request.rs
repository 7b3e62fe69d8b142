//! Request execution shared by every hub operation.
//!
//! Builds the request (auth, user agent, conditional and content-type
//! headers), hands it to the transport and classifies the outcome: transport
//! failures pass through, 2xx is success, anything else is
//! [`HubError::Unknown`] carrying the status.

use crate::auth::TokenProvider;
use crate::config::API_VERSION;
use crate::error::{HubError, HubResult};
use crate::transport::{HubRequest, HubResponse, Transport};
use reqwest::header::{
    HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, IF_MATCH, USER_AGENT,
};
use reqwest::{Method, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type for payloads that start with `{`.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type for every other payload.
pub const XML_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";

/// Picks the content type from the payload's first character.
pub fn content_type_for(payload: &str) -> &'static str {
    if payload.starts_with('{') {
        JSON_CONTENT_TYPE
    } else {
        XML_CONTENT_TYPE
    }
}

/// Product user agent sent with every request.
pub fn user_agent() -> String {
    format!(
        "NOTIFICATIONHUBS/{API_VERSION}(api-origin=RustSdk;os={};sdk_version={})",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    )
}

/// Sends requests through a transport with tokens from a provider.
#[derive(Clone)]
pub(crate) struct RequestExecutor {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl RequestExecutor {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            timeout,
        }
    }

    /// Executes one request and classifies the result.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        payload: Option<&str>,
        if_match: Option<&str>,
    ) -> HubResult<HubResponse> {
        let token = self
            .tokens
            .token(&url)
            .await
            .ok_or(HubError::FailedToRetrieveAuthorizationToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&token)
                .map_err(|_| HubError::FailedToRetrieveAuthorizationToken)?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent())
                .map_err(|e| HubError::unknown(format!("invalid user agent: {e}")))?,
        );
        if let Some(tag) = if_match {
            headers.insert(
                IF_MATCH,
                HeaderValue::from_str(&format!("\"{tag}\""))
                    .map_err(|e| HubError::unknown(format!("invalid If-Match value: {e}")))?,
            );
        }
        if let Some(payload) = payload {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(payload)),
            );
        }

        let request = HubRequest {
            method: method.clone(),
            url: url.clone(),
            headers,
            body: payload.map(str::to_string),
            timeout: self.timeout,
        };

        let response = self.transport.execute(request).await?;
        if response.status.is_success() {
            debug!("{} {} -> {}", method, url, response.status);
            Ok(response)
        } else {
            debug!("{} {} failed with {}", method, url, response.status);
            Err(HubError::status(response.status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_selects_json() {
        assert_eq!(content_type_for("{\"platform\":\"apns\"}"), JSON_CONTENT_TYPE);
    }

    #[test]
    fn anything_else_selects_xml() {
        assert_eq!(content_type_for("<?xml version=\"1.0\"?>"), XML_CONTENT_TYPE);
        assert_eq!(content_type_for(" {"), XML_CONTENT_TYPE);
        assert_eq!(content_type_for(""), XML_CONTENT_TYPE);
    }

    #[test]
    fn user_agent_names_api_version() {
        assert!(user_agent().starts_with("NOTIFICATIONHUBS/2013-04(api-origin="));
    }
}
