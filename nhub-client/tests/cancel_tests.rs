//! Single and bulk cancellation tests.

mod common;

use async_trait::async_trait;
use common::{
    configured_client, created, empty_feed, entry, feed, filter_token, last_segment, ok, status,
    ScriptedTransport, StaticTokens, CONNECTION, HUB, TOKEN_A,
};
use nhub_client::{HubClient, HubError, HubRequest, HubResponse, Transport, TransportError};
use nhub_types::{DeviceToken, Registration, DEFAULT_REGISTRATION_NAME};
use pretty_assertions::assert_eq;
use reqwest::Method;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn token() -> DeviceToken {
    DeviceToken::parse(TOKEN_A).unwrap()
}

fn three_registrations() -> String {
    feed(&[
        entry("r1", TOKEN_A, None),
        entry("r2", TOKEN_A, Some("alerts")),
        entry("r3", TOKEN_A, Some("promos")),
    ])
}

fn deleted_ids(transport: &ScriptedTransport) -> BTreeSet<String> {
    transport
        .requests()
        .iter()
        .filter(|r| r.method == Method::DELETE)
        .map(last_segment)
        .collect()
}

/// Lists three registrations, fails the delete of `r2` at once and holds
/// every other delete until the gate opens.
struct GatedTransport {
    gate: Semaphore,
    completed: AtomicUsize,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn execute(&self, request: HubRequest) -> Result<HubResponse, TransportError> {
        match request.method {
            Method::GET => Ok(ok(three_registrations())),
            Method::DELETE if last_segment(&request) == "r2" => Ok(status(500)),
            Method::DELETE => {
                let _permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(status(200))
            }
            _ => Ok(status(400)),
        }
    }
}

// ── Bulk ───────────────────────────────────────────────────────

#[tokio::test]
async fn unregister_all_with_nothing_registered_succeeds() {
    let transport = ScriptedTransport::new(|_| Ok(ok(empty_feed())));
    let client = configured_client(transport.clone());

    client.unregister_all(&token()).await.unwrap();

    assert_eq!(transport.count(Method::GET), 1);
    assert_eq!(transport.count(Method::DELETE), 0);
}

#[tokio::test]
async fn unregister_all_deletes_every_registration() {
    let transport = ScriptedTransport::new(|req| match req.method {
        Method::GET => Ok(ok(three_registrations())),
        Method::DELETE => Ok(status(200)),
        _ => Ok(status(500)),
    });
    let client = configured_client(transport.clone());

    client.unregister_all(&token()).await.unwrap();

    let expected: BTreeSet<String> = ["r1", "r2", "r3"].iter().map(|s| s.to_string()).collect();
    assert_eq!(deleted_ids(&transport), expected);
    assert_eq!(
        filter_token(&transport.requests()[0]).as_deref(),
        Some(TOKEN_A)
    );
    for request in transport.requests().iter().filter(|r| r.method == Method::DELETE) {
        assert_eq!(request.header("if-match"), Some("\"*\""));
    }
}

#[tokio::test]
async fn unregister_all_reports_a_failed_delete() {
    let transport = ScriptedTransport::new(|req| match (req.method.clone(), last_segment(req)) {
        (Method::GET, _) => Ok(ok(three_registrations())),
        (Method::DELETE, id) if id == "r2" => Ok(status(500)),
        (Method::DELETE, _) => Ok(status(200)),
        _ => Ok(status(400)),
    });
    let client = configured_client(transport);

    let err = client.unregister_all(&token()).await.unwrap_err();
    assert_eq!(err.http_status(), Some(500));
}

#[tokio::test]
async fn first_failure_is_reported_without_waiting_for_other_deletes() {
    let transport = Arc::new(GatedTransport {
        gate: Semaphore::new(0),
        completed: AtomicUsize::new(0),
    });
    let client = HubClient::builder()
        .transport(transport.clone())
        .token_provider(Arc::new(StaticTokens(Some("t".into()))))
        .build()
        .unwrap();
    client.configure(HUB, CONNECTION).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), client.unregister_all(&token()))
        .await
        .expect("bulk delete waited on held deletes")
        .unwrap_err();
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(transport.completed.load(Ordering::SeqCst), 0);

    // The held deletes still finish on their own.
    transport.gate.add_permits(2);
    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.completed.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unregister_all_stops_when_listing_fails() {
    let transport = ScriptedTransport::new(|req| match req.method {
        Method::GET => Ok(status(401)),
        _ => Ok(status(200)),
    });
    let client = configured_client(transport.clone());

    let err = client.unregister_all(&token()).await.unwrap_err();

    assert_eq!(err.http_status(), Some(401));
    assert_eq!(transport.count(Method::DELETE), 0);
}

#[tokio::test]
async fn unregister_all_clears_cached_entries() {
    let transport = ScriptedTransport::new(|req| match req.method {
        Method::GET => Ok(ok(feed(&[entry("r1", TOKEN_A, None)]))),
        Method::PUT => Ok(ok(entry("r1", TOKEN_A, None))),
        Method::DELETE => Ok(status(200)),
        _ => Ok(status(500)),
    });
    let client = configured_client(transport);

    client.register_native(&token(), &[]).await.unwrap();
    assert_eq!(client.cached_registrations().unwrap().len(), 1);

    client.unregister_all(&token()).await.unwrap();
    assert!(client.cached_registrations().unwrap().is_empty());
}

#[tokio::test]
async fn unregister_all_requires_configuration() {
    let transport = ScriptedTransport::new(|_| Ok(ok(empty_feed())));
    let client = HubClient::builder()
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client.unregister_all(&token()).await.unwrap_err();

    assert!(matches!(err, HubError::NotConfigured));
    assert!(transport.requests().is_empty());
}

// ── Single ─────────────────────────────────────────────────────

#[tokio::test]
async fn unregister_native_deletes_cached_registration() {
    let transport = ScriptedTransport::new(|req| match req.method {
        Method::GET => Ok(ok(empty_feed())),
        Method::POST => Ok(created("r1")),
        Method::PUT => Ok(ok(entry("r1", TOKEN_A, None))),
        Method::DELETE => Ok(status(200)),
        _ => Ok(status(500)),
    });
    let client = configured_client(transport.clone());

    client.register_native(&token(), &[]).await.unwrap();
    client.unregister_native().await.unwrap();

    let delete = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::DELETE)
        .unwrap();
    assert_eq!(last_segment(&delete), "r1");
    assert_eq!(delete.header("if-match"), Some("\"*\""));
    assert!(client
        .cached_registration(DEFAULT_REGISTRATION_NAME)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unregister_template_without_cache_entry_is_a_no_op() {
    let transport = ScriptedTransport::new(|_| Ok(status(500)));
    let client = configured_client(transport.clone());

    client.unregister_template("greeting").await.unwrap();
    client.unregister_native().await.unwrap();

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_cache_entry() {
    let transport = ScriptedTransport::new(|req| match req.method {
        Method::GET => Ok(ok(feed(&[entry("r1", TOKEN_A, Some("greeting"))]))),
        Method::PUT => Ok(ok(entry("r1", TOKEN_A, Some("greeting")))),
        _ => Ok(status(503)),
    });
    let client = configured_client(transport);

    client
        .register(&token(), "greeting", "{}")
        .await
        .unwrap();
    let err = client.unregister_template("greeting").await.unwrap_err();

    assert_eq!(err.http_status(), Some(503));
    assert!(client.cached_registration("greeting").unwrap().is_some());
}

#[tokio::test]
async fn unconfirmed_registration_cannot_be_deleted() {
    let transport = ScriptedTransport::new(|_| Ok(status(200)));
    let client = configured_client(transport.clone());

    let err = client
        .unregister(&Registration::new("greeting", TOKEN_A))
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::Unknown { status: None, .. }));
    assert!(transport.requests().is_empty());
}
