//! Route key to profile record resolution

use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::ErrorKind;
use crate::profile::{ProfileRecord, ProfileSource};

/// What the view should show for the current route key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The route key is not known yet
    Pending,
    /// The record was found
    Found(ProfileRecord),
    /// No record exists under the key
    NotFound,
    /// The lookup failed; the message is safe to show
    Failed(String),
    /// A newer navigation replaced this one before it finished
    Abandoned,
}

impl Resolution {
    /// The resolved record, if any
    pub fn record(&self) -> Option<&ProfileRecord> {
        match self {
            Resolution::Found(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<ProfileRecord> {
        match self {
            Resolution::Found(record) => Some(record),
            _ => None,
        }
    }
}

/// Resolves route keys to records without ever failing into the caller
pub struct IdentityResolver {
    source: Arc<dyn ProfileSource>,
    current: watch::Sender<Option<String>>,
}

impl IdentityResolver {
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        let (current, _) = watch::channel(None);
        Self { source, current }
    }

    /// Look up a single key
    ///
    /// An absent or empty key yields [`Resolution::Pending`] rather than
    /// [`Resolution::NotFound`]; the route simply has not been parsed yet.
    pub async fn resolve(&self, key: Option<&str>) -> Resolution {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return Resolution::Pending;
        };

        match self.source.fetch_profile(key).await {
            Ok(record) => Resolution::Found(record),
            Err(e) => match e.kind() {
                ErrorKind::NotFound => {
                    debug!("no profile for {}", key);
                    Resolution::NotFound
                }
                _ => {
                    warn!("resolving {} failed: {}", key, e);
                    Resolution::Failed(e.to_string())
                }
            },
        }
    }

    /// Make `key` the current route and resolve it
    ///
    /// If another navigation starts before this lookup completes, the
    /// lookup is dropped and [`Resolution::Abandoned`] is returned.
    pub async fn navigate(&self, key: Option<&str>) -> Resolution {
        self.current.send_replace(key.map(str::to_string));
        let mut changes = self.current.subscribe();

        tokio::select! {
            resolution = self.resolve(key) => resolution,
            _ = changes.changed() => {
                debug!("navigation to {:?} superseded", key);
                Resolution::Abandoned
            }
        }
    }

    /// The key of the most recent navigation
    pub fn current_key(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::profile::MemoryProfiles;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ProfileSource for Unreachable {
        async fn fetch_profile(&self, _key: &str) -> Result<ProfileRecord> {
            Err(Error::transient("connection refused"))
        }

        async fn save_profile(&self, _record: ProfileRecord) -> Result<ProfileRecord> {
            Err(Error::transient("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_pending_until_key_known() {
        let resolver = IdentityResolver::new(Arc::new(MemoryProfiles::new()));
        assert_eq!(resolver.resolve(None).await, Resolution::Pending);
        assert_eq!(resolver.resolve(Some("")).await, Resolution::Pending);
    }

    #[tokio::test]
    async fn test_found_and_not_found() {
        let source = Arc::new(MemoryProfiles::new());
        let mut record = ProfileRecord::with_name("Ada");
        record.username = Some("ada".to_string());
        source.save_profile(record.clone()).await.unwrap();

        let resolver = IdentityResolver::new(source);
        assert_eq!(resolver.resolve(Some("ada")).await, Resolution::Found(record));
        assert_eq!(resolver.resolve(Some("bob")).await, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_transient_failure_is_reported_not_raised() {
        let resolver = IdentityResolver::new(Arc::new(Unreachable));
        match resolver.resolve(Some("ada")).await {
            Resolution::Failed(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_navigate_tracks_current_key() {
        let resolver = IdentityResolver::new(Arc::new(MemoryProfiles::new()));
        assert_eq!(resolver.navigate(Some("ada")).await, Resolution::NotFound);
        assert_eq!(resolver.current_key().as_deref(), Some("ada"));
    }
}
