//! Notification hub registration client.
//!
//! Keeps a device's named registrations (native and template) in sync with a
//! notification hub, using a persistent local cache to avoid redundant calls
//! and to recover when the hub drops a registration.
//!
//! # Architecture
//!
//! - **Config**: connection-string parsing and hub URLs
//! - **Auth**: shared access signature tokens
//! - **Transport**: the HTTP seam (reqwest in production, scripted in tests)
//! - **Decoder**: Atom/XML registration descriptions
//! - **Cache**: last known registration per name, persisted as JSON
//! - **Engine**: create / update / recreate decisions per registration
//! - **Cancel**: concurrent deletion of every registration for a token
//!
//! # Example
//!
//! ```no_run
//! use nhub_client::HubClient;
//! use nhub_types::DeviceToken;
//!
//! # async fn run() -> nhub_client::HubResult<()> {
//! let client = HubClient::builder().cache_dir(".nhub").build()?;
//! client.configure(
//!     "myhub",
//!     "Endpoint=sb://example.servicebus.windows.net/;SharedAccessKeyName=Listen;SharedAccessKey=c2VjcmV0",
//! )?;
//!
//! let token = DeviceToken::parse("<a1b2c3d4 e5f60718>")?;
//! let registration = client.register_native(&token, &["sports".to_string()]).await?;
//! println!("registered {}", registration.id);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
mod cancel;
mod client;
pub mod config;
pub mod decoder;
mod engine;
mod error;
pub mod payload;
pub mod request;
pub mod transport;

pub use auth::{SasTokenProvider, TokenProvider};
pub use cache::{CacheSnapshot, RegistrationCache};
pub use client::{HubClient, HubClientBuilder};
pub use config::{ConnectionString, HubEndpoints, API_VERSION};
pub use decoder::{AtomRegistrationDecoder, RegistrationDecoder};
pub use error::{HubError, HubResult, TransportError};
pub use payload::{native_payload, template_payload, TemplateRegistration};
pub use transport::{HubRequest, HubResponse, ReqwestTransport, Transport};
