//! Profile records and the client that syncs them with the backend

mod types;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use types::*;

/// A place profile records are read from and saved to
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch a record by its route key
    ///
    /// An absent record is reported as [`Error::NotFound`].
    async fn fetch_profile(&self, key: &str) -> Result<ProfileRecord>;

    /// Upsert a whole record, returning what was stored
    ///
    /// A record without an identifier gets one generated before it is sent.
    async fn save_profile(&self, record: ProfileRecord) -> Result<ProfileRecord>;
}

/// Client for the profile endpoints of the card backend
#[derive(Clone)]
pub struct ProfileClient {
    /// The base URL of the backend
    base_url: Url,

    /// HTTP client used for requests
    client: Client,
}

impl ProfileClient {
    /// Create a new profile client
    pub fn new(base_url: Url, client: Client) -> Self {
        Self { base_url, client }
    }

    fn profiles_url(&self, key: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::config(format!("{} cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty().push("api").push("profiles");
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ProfileSource for ProfileClient {
    async fn fetch_profile(&self, key: &str) -> Result<ProfileRecord> {
        if key.is_empty() {
            return Err(Error::validation("profile key must not be empty"));
        }

        let url = self.profiles_url(Some(key))?;
        Fetch::get(&self.client, url)
            .execute_optional::<ProfileRecord>()
            .await?
            .ok_or_else(|| Error::not_found(format!("no profile named {}", key)))
    }

    async fn save_profile(&self, mut record: ProfileRecord) -> Result<ProfileRecord> {
        record.validate()?;
        record.ensure_username();

        let url = self.profiles_url(None)?;
        let body = Fetch::post(&self.client, url)
            .json(&record)?
            .execute_text()
            .await?;

        let saved = if body.trim().is_empty() {
            record
        } else {
            serde_json::from_str(&body)
                .map_err(|e| Error::transient(format!("malformed save response: {}", e)))?
        };

        info!("saved profile {}", saved.key().unwrap_or_default());
        Ok(saved)
    }
}

/// In-process profile source, keyed by username
///
/// Stands in for the backend when a real one is not wanted, such as in
/// tests or offline previews.
#[derive(Default)]
pub struct MemoryProfiles {
    records: Mutex<HashMap<String, ProfileRecord>>,
}

impl MemoryProfiles {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether no record has been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileSource for MemoryProfiles {
    async fn fetch_profile(&self, key: &str) -> Result<ProfileRecord> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::storage("profile map poisoned"))?;
        records
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no profile named {}", key)))
    }

    async fn save_profile(&self, mut record: ProfileRecord) -> Result<ProfileRecord> {
        record.validate()?;
        let key = record.ensure_username().to_string();

        debug!("storing profile {} in memory", key);
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::storage("profile map poisoned"))?;
        records.insert(key, record.clone());
        Ok(record)
    }
}
