//! Public client API.

use crate::auth::{SasTokenProvider, TokenProvider};
use crate::cache::{self, RegistrationCache};
use crate::cancel;
use crate::config::{ConnectionString, HubEndpoints};
use crate::decoder::{AtomRegistrationDecoder, RegistrationDecoder};
use crate::engine::Reconciler;
use crate::error::{HubError, HubResult};
use crate::payload::{native_payload, template_payload, TemplateRegistration};
use crate::request::{RequestExecutor, REQUEST_TIMEOUT};
use crate::transport::{ReqwestTransport, Transport};
use nhub_types::{validate_template_name, DeviceToken, Registration, DEFAULT_REGISTRATION_NAME};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

/// Builder for [`HubClient`].
pub struct HubClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    decoder: Arc<dyn RegistrationDecoder>,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for HubClientBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            token_provider: None,
            decoder: Arc::new(AtomRegistrationDecoder),
            cache_dir: None,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl HubClientBuilder {
    /// Uses `transport` instead of a reqwest client.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `provider` instead of signing with the connection-string key.
    #[must_use]
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Uses `decoder` for response bodies.
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn RegistrationDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Persists the registration cache under `dir`.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds an unconfigured client.
    pub fn build(self) -> HubResult<HubClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(HubClient {
            transport,
            token_provider: self.token_provider,
            decoder: self.decoder,
            cache_dir: self.cache_dir,
            timeout: self.timeout,
            reconciler: OnceLock::new(),
        })
    }
}

/// Keeps a device's named registrations in sync with a notification hub.
///
/// Every operation fails with [`HubError::NotConfigured`] until
/// [`configure`](Self::configure) has succeeded.
pub struct HubClient {
    transport: Arc<dyn Transport>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    decoder: Arc<dyn RegistrationDecoder>,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
    reconciler: OnceLock<Reconciler>,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("cache_dir", &self.cache_dir)
            .field("timeout", &self.timeout)
            .field("custom_token_provider", &self.token_provider.is_some())
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl HubClient {
    pub fn builder() -> HubClientBuilder {
        HubClientBuilder::default()
    }

    /// Binds the client to `hub_path` on the namespace named by
    /// `connection_string` and loads that hub's registration cache.
    pub fn configure(&self, hub_path: &str, connection_string: &str) -> HubResult<()> {
        if self.is_configured() {
            return Err(HubError::AlreadyConfigured);
        }

        let connection = ConnectionString::parse(connection_string)?;
        let endpoints = HubEndpoints::new(&connection.endpoint, hub_path)?;
        let tokens: Arc<dyn TokenProvider> = match &self.token_provider {
            Some(provider) => Arc::clone(provider),
            None => Arc::new(SasTokenProvider::from_connection_string(&connection)),
        };
        let cache = match &self.cache_dir {
            Some(dir) => RegistrationCache::open_in(dir, hub_path),
            None => RegistrationCache::in_memory(),
        };

        let executor = RequestExecutor::new(Arc::clone(&self.transport), tokens, self.timeout);
        let reconciler = Reconciler::new(executor, Arc::clone(&self.decoder), endpoints, cache);

        self.reconciler
            .set(reconciler)
            .map_err(|_| HubError::AlreadyConfigured)?;
        info!(
            "Configured hub {} at {}",
            hub_path,
            connection.endpoint.as_str()
        );
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.reconciler.get().is_some()
    }

    fn reconciler(&self) -> HubResult<&Reconciler> {
        self.reconciler.get().ok_or(HubError::NotConfigured)
    }

    // ── Registration ─────────────────────────────────────────────

    /// Creates or updates the registration `name` with an opaque payload.
    pub async fn register(
        &self,
        device_token: &DeviceToken,
        name: &str,
        payload: &str,
    ) -> HubResult<Registration> {
        let reconciler = self.reconciler()?;
        if name != DEFAULT_REGISTRATION_NAME {
            validate_template_name(name)?;
        }
        reconciler.register(device_token.as_str(), name, payload).await
    }

    /// Registers the device for native notifications under `tags`.
    pub async fn register_native(
        &self,
        device_token: &DeviceToken,
        tags: &[String],
    ) -> HubResult<Registration> {
        let reconciler = self.reconciler()?;
        let payload = native_payload(device_token, tags)?;
        reconciler
            .register(device_token.as_str(), DEFAULT_REGISTRATION_NAME, &payload)
            .await
    }

    /// Registers the device for the template described by `template`.
    pub async fn register_template(
        &self,
        device_token: &DeviceToken,
        template: &TemplateRegistration,
    ) -> HubResult<Registration> {
        let reconciler = self.reconciler()?;
        let payload = template_payload(device_token, template)?;
        reconciler
            .register(device_token.as_str(), &template.name, &payload)
            .await
    }

    // ── Cancellation ─────────────────────────────────────────────

    /// Deletes one registration.
    pub async fn unregister(&self, registration: &Registration) -> HubResult<()> {
        self.reconciler()?.delete(registration).await
    }

    /// Deletes the native registration, if one is cached.
    pub async fn unregister_native(&self) -> HubResult<()> {
        self.unregister_named(DEFAULT_REGISTRATION_NAME).await
    }

    /// Deletes the template registration `name`, if one is cached.
    pub async fn unregister_template(&self, name: &str) -> HubResult<()> {
        self.unregister_named(name).await
    }

    async fn unregister_named(&self, name: &str) -> HubResult<()> {
        let reconciler = self.reconciler()?;
        let cached = cache::lock(reconciler.cache()).get(name).cloned();
        match cached {
            Some(registration) if registration.is_confirmed() => {
                reconciler.delete(&registration).await
            }
            _ => {
                debug!("No cached registration named {}, nothing to delete", name);
                Ok(())
            }
        }
    }

    /// Deletes every registration the hub holds for `device_token`.
    pub async fn unregister_all(&self, device_token: &DeviceToken) -> HubResult<()> {
        let reconciler = self.reconciler()?;
        cancel::cancel_all(reconciler, device_token.as_str()).await
    }

    // ── Cache views ──────────────────────────────────────────────

    /// Cached registration for `name`.
    pub fn cached_registration(&self, name: &str) -> HubResult<Option<Registration>> {
        let reconciler = self.reconciler()?;
        Ok(cache::lock(reconciler.cache()).get(name).cloned())
    }

    /// All cached registrations, sorted by name.
    pub fn cached_registrations(&self) -> HubResult<Vec<Registration>> {
        let reconciler = self.reconciler()?;
        let mut registrations: Vec<Registration> =
            cache::lock(reconciler.cache()).registrations().cloned().collect();
        registrations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(registrations)
    }

    /// Device token of the last successful reconciliation.
    pub fn cached_device_token(&self) -> HubResult<Option<String>> {
        let reconciler = self.reconciler()?;
        Ok(cache::lock(reconciler.cache())
            .last_device_token()
            .map(str::to_string))
    }
}
