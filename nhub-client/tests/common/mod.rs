//! Shared test doubles for hub client tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nhub_client::{
    HubClient, HubRequest, HubResponse, TokenProvider, Transport, TransportError,
};
use reqwest::{Method, StatusCode, Url};
use std::sync::{Arc, Mutex};

pub const HUB: &str = "testhub";
pub const CONNECTION: &str = "Endpoint=sb://test.example.com/;SharedAccessKeyName=DefaultListenSharedAccessSignature;SharedAccessKey=c2VjcmV0a2V5";
pub const TOKEN_A: &str = "AAAA1111";
pub const TOKEN_B: &str = "BBBB2222";

type Handler = dyn Fn(&HubRequest) -> Result<HubResponse, TransportError> + Send + Sync;

/// Transport that records every request and answers through a closure.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HubRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HubRequest) -> Result<HubResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HubRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `(method, path)` of every request, in order.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests()
            .into_iter()
            .map(|r| (r.method, r.url.path().to_string()))
            .collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HubRequest) -> Result<HubResponse, TransportError> {
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// Token provider returning a fixed value (or nothing).
pub struct StaticTokens(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn token(&self, _url: &Url) -> Option<String> {
        self.0.clone()
    }
}

/// Client with the given transport, configured for [`HUB`].
pub fn configured_client(transport: Arc<ScriptedTransport>) -> HubClient {
    let client = HubClient::builder()
        .transport(transport)
        .token_provider(Arc::new(StaticTokens(Some("SharedAccessSignature test".into()))))
        .build()
        .unwrap();
    client.configure(HUB, CONNECTION).unwrap();
    client
}

// ── Response builders ──────────────────────────────────────────

pub fn status(code: u16) -> HubResponse {
    HubResponse::new(StatusCode::from_u16(code).unwrap())
}

pub fn ok(body: impl Into<String>) -> HubResponse {
    status(200).with_body(body)
}

/// 201 with a `Location` pointing at registration `id`.
pub fn created(id: &str) -> HubResponse {
    status(201).with_header(
        "Location",
        &format!("https://test.example.com/{HUB}/registrations/{id}?api-version=2013-04"),
    )
}

pub fn description(id: &str, device_token: &str, template_name: Option<&str>) -> String {
    match template_name {
        None => format!(
            "<AppleRegistrationDescription xmlns=\"http://schemas.microsoft.com/netservices/2010/10/servicebus/connect\">\
             <ETag>1</ETag><ExpirationTime>2099-01-01T00:00:00Z</ExpirationTime>\
             <RegistrationId>{id}</RegistrationId><DeviceToken>{device_token}</DeviceToken>\
             </AppleRegistrationDescription>"
        ),
        Some(name) => format!(
            "<AppleTemplateRegistrationDescription xmlns=\"http://schemas.microsoft.com/netservices/2010/10/servicebus/connect\">\
             <ETag>1</ETag><RegistrationId>{id}</RegistrationId><DeviceToken>{device_token}</DeviceToken>\
             <BodyTemplate><![CDATA[{{\"aps\":{{\"alert\":\"$(msg)\"}}}}]]></BodyTemplate>\
             <TemplateName>{name}</TemplateName></AppleTemplateRegistrationDescription>"
        ),
    }
}

/// Single Atom entry, as returned by `PUT`.
pub fn entry(id: &str, device_token: &str, template_name: Option<&str>) -> String {
    format!(
        "<entry xmlns=\"http://www.w3.org/2005/Atom\"><id>{id}</id><content type=\"application/xml\">{}</content></entry>",
        description(id, device_token, template_name)
    )
}

/// Atom feed of entries, as returned by a listing.
pub fn feed(entries: &[String]) -> String {
    format!(
        "<feed xmlns=\"http://www.w3.org/2005/Atom\"><title type=\"text\">Registrations</title>{}</feed>",
        entries.join("")
    )
}

pub fn empty_feed() -> String {
    feed(&[])
}

/// Last path segment of a request URL.
pub fn last_segment(request: &HubRequest) -> String {
    request
        .url
        .path_segments()
        .and_then(|s| s.filter(|p| !p.is_empty()).last())
        .unwrap_or_default()
        .to_string()
}

/// Device token in a listing request's `$filter`.
pub fn filter_token(request: &HubRequest) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "$filter")
        .map(|(_, v)| v.trim_start_matches("deviceToken eq '").trim_end_matches('\'').to_string())
}
