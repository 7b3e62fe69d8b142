//! Registration reconciliation.
//!
//! A registration call runs as a short state machine:
//!
//! ```text
//! Refresh ──► Locate ──► Upsert(cached id) ──► done
//!   (only if     │             │ 410 Gone
//!    needed)     ▼             ▼
//!              Create ──► Upsert(new id) ──► done
//! ```
//!
//! `Refresh` lists the hub's registrations for the previous device token and
//! rebuilds the cache before anything is written, so a changed token updates
//! the existing registrations instead of duplicating them. The 410 fallback
//! is taken at most once per call.

use crate::cache::{self, CacheWriter, RegistrationCache};
use crate::config::HubEndpoints;
use crate::decoder::RegistrationDecoder;
use crate::error::{HubError, HubResult};
use crate::request::RequestExecutor;
use nhub_types::Registration;
use reqwest::header::LOCATION;
use reqwest::{Method, Url};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Step {
    Refresh,
    Locate,
    Create,
    Upsert { id: String, cached: bool },
}

/// Collaborators needed to reconcile registrations of one hub.
///
/// Cloning is cheap; spawned tasks take a clone instead of the client.
#[derive(Clone)]
pub(crate) struct Reconciler {
    executor: RequestExecutor,
    decoder: Arc<dyn RegistrationDecoder>,
    endpoints: Arc<HubEndpoints>,
    cache: Arc<Mutex<RegistrationCache>>,
    writer: Arc<CacheWriter>,
}

impl Reconciler {
    pub(crate) fn new(
        executor: RequestExecutor,
        decoder: Arc<dyn RegistrationDecoder>,
        endpoints: HubEndpoints,
        cache: RegistrationCache,
    ) -> Self {
        Self {
            executor,
            decoder,
            endpoints: Arc::new(endpoints),
            cache: Arc::new(Mutex::new(cache)),
            writer: Arc::new(CacheWriter::default()),
        }
    }

    pub(crate) fn cache(&self) -> &Mutex<RegistrationCache> {
        &self.cache
    }

    /// Makes the hub's registration `name` match `payload` for `device_token`.
    pub(crate) async fn register(
        &self,
        device_token: &str,
        name: &str,
        payload: &str,
    ) -> HubResult<Registration> {
        let needs_refresh = cache::lock(&self.cache).requires_refresh_for(device_token);
        let mut step = if needs_refresh {
            Step::Refresh
        } else {
            Step::Locate
        };

        loop {
            debug!("Registration {}: {:?}", name, step);
            step = match step {
                Step::Refresh => {
                    let list_token = cache::lock(&self.cache)
                        .refresh_token_for(device_token)
                        .to_string();
                    let listed = self.list(&list_token).await?;
                    debug!(
                        "Refreshed cache from {} registrations for token {}",
                        listed.len(),
                        list_token
                    );
                    let snapshot = {
                        let mut cache = cache::lock(&self.cache);
                        cache.refresh_finished(device_token, listed);
                        cache.snapshot()
                    };
                    self.writer.persist(snapshot).await;
                    Step::Locate
                }
                Step::Locate => {
                    let cached_id = cache::lock(&self.cache)
                        .get(name)
                        .map(|r| r.id.clone())
                        .filter(|id| !id.is_empty());
                    match cached_id {
                        Some(id) => Step::Upsert { id, cached: true },
                        None => Step::Create,
                    }
                }
                Step::Create => {
                    let id = self.create_id(payload).await?;
                    Step::Upsert { id, cached: false }
                }
                Step::Upsert { id, cached } => match self.upsert(&id, name, payload).await {
                    Ok(registration) => return Ok(registration),
                    Err(e) if cached && e.is_gone() => {
                        warn!("Registration {} ({}) is gone on the hub, recreating", id, name);
                        Step::Create
                    }
                    Err(e) => return Err(e),
                },
            };
        }
    }

    /// Lists every registration bound to `device_token`.
    pub(crate) async fn list(&self, device_token: &str) -> HubResult<Vec<Registration>> {
        let url = self.endpoints.registrations_for_token(device_token)?;
        let response = self.executor.send(Method::GET, url, None, None).await?;
        self.decoder.decode(&response.body)
    }

    /// Allocates a new registration id.
    async fn create_id(&self, payload: &str) -> HubResult<String> {
        let url = self.endpoints.registration_ids()?;
        let response = self
            .executor
            .send(Method::POST, url, Some(payload), None)
            .await?;

        let location = response
            .header(LOCATION.as_str())
            .ok_or_else(|| HubError::unknown("create response has no Location header"))?;
        let id = registration_id_from_location(location).ok_or_else(|| {
            HubError::unknown(format!("cannot read a registration id from Location {location:?}"))
        })?;

        debug!("Hub allocated registration id {}", id);
        Ok(id)
    }

    /// Creates or replaces registration `id` and caches the result as `name`.
    async fn upsert(&self, id: &str, name: &str, payload: &str) -> HubResult<Registration> {
        let url = self.endpoints.registration(id)?;
        let response = self
            .executor
            .send(Method::PUT, url, Some(payload), None)
            .await?;

        let mut registration = self
            .decoder
            .decode(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| HubError::Decode(format!("hub returned no registration for {id}")))?;

        registration.name = name.to_string();
        let snapshot = {
            let mut cache = cache::lock(&self.cache);
            cache.insert(name, registration.clone());
            cache.snapshot()
        };
        self.writer.persist(snapshot).await;
        info!("Registered {} as {}", name, registration.id);
        Ok(registration)
    }

    /// Deletes `registration` regardless of its current ETag.
    pub(crate) async fn delete(&self, registration: &Registration) -> HubResult<()> {
        if !registration.is_confirmed() {
            return Err(HubError::unknown(format!(
                "registration {} was never confirmed by the hub",
                registration.name
            )));
        }
        let url = self.endpoints.registration(&registration.id)?;
        self.executor
            .send(Method::DELETE, url, None, Some("*"))
            .await?;

        let snapshot = {
            let mut cache = cache::lock(&self.cache);
            cache.remove(&registration.name).and_then(|_| cache.snapshot())
        };
        self.writer.persist(snapshot).await;
        info!("Deleted registration {} ({})", registration.id, registration.name);
        Ok(())
    }
}

/// Last path segment of a `Location` header, ignoring query and fragment.
pub(crate) fn registration_id_from_location(location: &str) -> Option<String> {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location
            .split(|c: char| c == '?' || c == '#')
            .next()?
            .to_string(),
    };
    let (_, last) = path.trim_end_matches('/').rsplit_once('/')?;
    if last.is_empty() {
        return None;
    }
    let id = urlencoding::decode(last).ok()?.into_owned();
    Some(id)
}
