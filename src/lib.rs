//! cardlink client library
//!
//! A Rust client for digital business cards: resolving a card by its route
//! key, deciding whether this device may edit it, syncing edits with the
//! backend, producing the contact card and scannable-code payload, and
//! booking appointments.

pub mod card;
pub mod config;
pub mod editor;
pub mod error;
pub mod fetch;
pub mod ownership;
pub mod profile;
pub mod resolver;

pub use cardlink_appointments as appointments;

use reqwest::Client;
use std::sync::Arc;

use crate::appointments::AppointmentsClient;
use crate::config::ClientOptions;
use crate::editor::ProfileEditor;
use crate::error::{Error, Result};
use crate::ownership::{LocalStore, MemoryStore, Ownership};
use crate::profile::{ProfileClient, ProfileSource};
use crate::resolver::IdentityResolver;

/// The main entry point for the cardlink client
pub struct Cardlink {
    /// Client options
    pub options: ClientOptions,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Device-local storage for claims, the device id and the cached draft
    store: Arc<dyn LocalStore>,
}

impl Cardlink {
    /// Create a new client backed by in-memory device storage
    ///
    /// # Example
    ///
    /// ```
    /// use cardlink::Cardlink;
    ///
    /// let cards = Cardlink::new("https://cards.example.com").unwrap();
    /// let profiles = cards.profiles();
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Self::new_with_options(ClientOptions::new(base_url)?, Arc::new(MemoryStore::new()))
    }

    /// Create a new client with custom options and device storage
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use cardlink::{Cardlink, config::ClientOptions, ownership::{FileStore, OwnershipPolicy}};
    ///
    /// let options = ClientOptions::new("https://cards.example.com")
    ///     .unwrap()
    ///     .with_ownership_policy(OwnershipPolicy::DeviceMatch);
    /// let store = Arc::new(FileStore::new("/tmp/cardlink-device.json"));
    /// let cards = Cardlink::new_with_options(options, store).unwrap();
    /// ```
    pub fn new_with_options(options: ClientOptions, store: Arc<dyn LocalStore>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            options,
            http_client,
            store,
        })
    }

    /// Create a client configured from `CARDLINK_*` environment variables
    pub fn from_env(store: Arc<dyn LocalStore>) -> Result<Self> {
        Self::new_with_options(ClientOptions::from_env()?, store)
    }

    /// Client for the profile endpoints
    pub fn profiles(&self) -> ProfileClient {
        ProfileClient::new(self.options.base_url.clone(), self.http_client.clone())
    }

    /// Resolver mapping route keys to records
    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.source())
    }

    /// Ownership heuristic bound to this device's storage
    pub fn ownership(&self) -> Ownership {
        Ownership::new(self.store.clone(), self.options.ownership)
    }

    /// A fresh editing session
    pub fn editor(&self) -> ProfileEditor {
        ProfileEditor::new(self.source(), self.ownership(), &self.options)
    }

    /// Client for booking appointments
    pub fn appointments(&self) -> Result<AppointmentsClient> {
        AppointmentsClient::new(self.options.base_url.as_str(), self.http_client.clone())
            .map_err(Error::config)
    }

    fn source(&self) -> Arc<dyn ProfileSource> {
        Arc::new(self.profiles())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::card::{contact_card, contact_links, ContactLink, QrPayload};
    pub use crate::config::ClientOptions;
    pub use crate::editor::ProfileEditor;
    pub use crate::error::{Error, ErrorKind};
    pub use crate::ownership::{FileStore, LocalStore, MemoryStore, OwnershipPolicy};
    pub use crate::profile::{ProfileField, ProfileRecord, ProfileSource};
    pub use crate::resolver::Resolution;
    pub use crate::Cardlink;
}
