//! Page-scoped editing session for one card

use log::{debug, warn};
use std::sync::Arc;
use url::Url;

use crate::card::{self, ContactLink, QrPayload};
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::ownership::{
    DecisionReason, LocalStore, Ownership, OwnershipDecision, OwnershipPolicy, DRAFT_KEY,
};
use crate::profile::{ProfileField, ProfileRecord, ProfileSource};
use crate::resolver::{IdentityResolver, Resolution};

/// Ties resolution, ownership and sync together for the card on screen
///
/// The session starts empty. [`ProfileEditor::open`] loads an existing card
/// and [`ProfileEditor::create`] starts a new one. Only an owner can enter
/// edit mode or save.
pub struct ProfileEditor {
    source: Arc<dyn ProfileSource>,
    resolver: IdentityResolver,
    ownership: Ownership,
    share_base: Url,
    qr_service: Url,
    qr_size: u32,

    record: Option<ProfileRecord>,
    snapshot: Option<ProfileRecord>,
    decision: Option<OwnershipDecision>,
    editing: bool,
}

impl ProfileEditor {
    pub fn new(source: Arc<dyn ProfileSource>, ownership: Ownership, options: &ClientOptions) -> Self {
        Self {
            resolver: IdentityResolver::new(source.clone()),
            source,
            ownership,
            share_base: options.share_base().clone(),
            qr_service: options.qr_service_url.clone(),
            qr_size: options.qr_size,
            record: None,
            snapshot: None,
            decision: None,
            editing: false,
        }
    }

    /// Load the card under `key` and decide whether this device may edit it
    ///
    /// Anything but [`Resolution::Found`] leaves the session empty.
    pub async fn open(&mut self, key: Option<&str>) -> Resolution {
        let resolution = self.resolver.navigate(key).await;

        let mut record = match resolution {
            Resolution::Found(record) => record,
            Resolution::Abandoned => return Resolution::Abandoned,
            other => {
                self.record = None;
                self.snapshot = None;
                self.decision = None;
                self.editing = false;
                return other;
            }
        };

        let decision = self.ownership.on_view(&mut record);
        self.editing = decision.edit_mode;
        self.decision = Some(decision);
        self.snapshot = Some(record.clone());
        self.record = Some(record.clone());
        Resolution::Found(record)
    }

    /// Start a new, unsaved card owned by this device
    pub fn create(&mut self) {
        let record = ProfileRecord::default();
        self.snapshot = Some(record.clone());
        self.record = Some(record);
        self.decision = Some(OwnershipDecision::creator());
        self.editing = true;
    }

    pub fn record(&self) -> Option<&ProfileRecord> {
        self.record.as_ref()
    }

    pub fn decision(&self) -> Option<&OwnershipDecision> {
        self.decision.as_ref()
    }

    pub fn is_owner(&self) -> bool {
        self.decision.is_some_and(|d| d.is_owner)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// The card's resolution key, if one is loaded
    pub fn current_key(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.key())
    }

    fn loaded(&mut self) -> Result<&mut ProfileRecord> {
        self.record
            .as_mut()
            .ok_or_else(|| Error::validation("no card is open"))
    }

    fn require_owner(&self) -> Result<()> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(Error::validation("this card belongs to another device"))
        }
    }

    /// Explicitly claim the open card for this device
    pub fn claim(&mut self) -> Result<OwnershipDecision> {
        let ownership = self.ownership.clone();
        let record = self.loaded()?;
        let decision = ownership.claim(record)?;
        let claimed = record.clone();

        if !self.editing {
            self.snapshot = Some(claimed);
        }
        self.decision = Some(decision);
        Ok(decision)
    }

    /// Switch to edit mode
    pub fn begin_edit(&mut self) -> Result<()> {
        self.loaded()?;
        self.require_owner()?;
        self.editing = true;
        Ok(())
    }

    /// Change one field of the open card
    pub fn set_field(&mut self, field: ProfileField, value: &str) -> Result<()> {
        if !self.editing {
            return Err(Error::validation("not in edit mode"));
        }
        self.loaded()?.set(field, value);
        Ok(())
    }

    pub fn field(&self, field: ProfileField) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.get(field))
    }

    /// Drop unsaved changes and leave edit mode
    pub fn cancel_edit(&mut self) {
        self.record = self.snapshot.clone();
        self.editing = false;
    }

    /// Persist the open card and leave edit mode
    ///
    /// Only an owner in edit mode can save. Under [`OwnershipPolicy::DeviceMatch`] the card is stamped with this
    /// device's identifier first. Under [`OwnershipPolicy::BindOnFirstView`]
    /// the claim for the saved identifier is written afterwards; an existing
    /// claim is left alone.
    pub async fn save(&mut self) -> Result<ProfileRecord> {
        self.require_owner()?;
        if !self.editing {
            return Err(Error::validation("not in edit mode"));
        }
        let mut record = self.loaded()?.clone();

        if self.ownership.options().policy == OwnershipPolicy::DeviceMatch {
            record.owner_device = Some(self.ownership.device_id()?);
        }

        let mut saved = self.source.save_profile(record).await?;

        let decision = match self.ownership.options().policy {
            OwnershipPolicy::BindOnFirstView => match self.ownership.claim(&mut saved) {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("saved card could not be claimed locally: {}", e);
                    self.ownership.evaluate(&saved)
                }
            },
            OwnershipPolicy::DeviceMatch => self.ownership.evaluate(&saved),
        };

        // A card saved in this session stays editable here even when the
        // local claim could not be recorded.
        self.decision = Some(if decision.reason == DecisionReason::StorageUnavailable {
            OwnershipDecision { edit_mode: false, ..OwnershipDecision::creator() }
        } else {
            decision
        });

        self.cache_draft(&saved);
        self.record = Some(saved.clone());
        self.snapshot = Some(saved.clone());
        self.editing = false;
        debug!("editor saved {}", saved.key().unwrap_or_default());
        Ok(saved)
    }

    fn cache_draft(&self, record: &ProfileRecord) {
        let cached = serde_json::to_string(record)
            .map_err(Error::from)
            .and_then(|json| self.ownership.store().set(DRAFT_KEY, &json));
        if let Err(e) = cached {
            warn!("could not cache draft: {}", e);
        }
    }

    /// The last card saved from this device, if it is still cached
    pub fn last_draft(&self) -> Option<ProfileRecord> {
        let json = match self.ownership.store().get(DRAFT_KEY) {
            Ok(json) => json?,
            Err(e) => {
                warn!("could not read cached draft: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("discarding malformed cached draft: {}", e);
                None
            }
        }
    }

    /// Contact card text for the open card
    pub fn contact_card(&self) -> Option<String> {
        self.record.as_ref().map(card::contact_card)
    }

    /// Download name for the open card's contact card
    pub fn contact_file_name(&self) -> Option<String> {
        self.record.as_ref().map(card::contact_file_name)
    }

    /// Tappable contact rows for the open card
    pub fn contact_links(&self) -> Vec<ContactLink> {
        self.record
            .as_ref()
            .map(card::contact_links)
            .unwrap_or_default()
    }

    /// Scannable-code payload: a profile link once the card has an
    /// identifier, the contact card itself before that
    pub fn qr_payload(&self) -> Option<QrPayload> {
        let record = self.record.as_ref()?;
        match record.key() {
            Some(key) => QrPayload::profile_link(&self.share_base, key).ok(),
            None => Some(QrPayload::contact(record)),
        }
    }

    /// Image URL of the scannable code
    pub fn qr_image_url(&self) -> Option<Url> {
        self.qr_payload()
            .map(|payload| payload.image_url(&self.qr_service, self.qr_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::{claim_key, MemoryStore, OwnershipOptions};
    use crate::profile::MemoryProfiles;

    fn options(policy: OwnershipPolicy) -> ClientOptions {
        ClientOptions::new("https://cards.example.com")
            .unwrap()
            .with_ownership_policy(policy)
    }

    fn editor(
        source: Arc<MemoryProfiles>,
        store: Arc<MemoryStore>,
        policy: OwnershipPolicy,
    ) -> ProfileEditor {
        let options = options(policy);
        let ownership = Ownership::new(store, options.ownership);
        ProfileEditor::new(source, ownership, &options)
    }

    async fn seed(source: &MemoryProfiles, username: &str) -> ProfileRecord {
        let mut record = ProfileRecord::with_name("Ada Lovelace");
        record.username = Some(username.to_string());
        record.email = Some("ada@example.com".to_string());
        source.save_profile(record).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_edit_save_reopen() {
        let source = Arc::new(MemoryProfiles::new());
        let store = Arc::new(MemoryStore::new());
        let mut ed = editor(source.clone(), store.clone(), OwnershipPolicy::BindOnFirstView);

        ed.create();
        assert!(ed.is_owner() && ed.is_editing());
        ed.set_field(ProfileField::Name, "Ada Lovelace").unwrap();
        ed.set_field(ProfileField::Website, "https://ada.example.com").unwrap();

        let saved = ed.save().await.unwrap();
        let key = saved.key().unwrap().to_string();
        assert!(key.starts_with("ada-lovelace-"));
        assert!(!ed.is_editing());
        assert!(store.get(&claim_key(&key)).unwrap().is_some());
        assert_eq!(ed.last_draft(), Some(saved.clone()));

        let mut reopened = editor(source, store, OwnershipPolicy::BindOnFirstView);
        assert_eq!(reopened.open(Some(key.as_str())).await, Resolution::Found(saved));
        assert!(reopened.is_owner());
        assert!(!reopened.is_editing());
    }

    #[tokio::test]
    async fn test_visitor_is_read_only() {
        let source = Arc::new(MemoryProfiles::new());
        seed(&source, "ada").await;

        let store = Arc::new(MemoryStore::new());
        let mut ed = editor(source, store.clone(), OwnershipPolicy::BindOnFirstView);
        ed.open(Some("ada")).await;

        assert!(!ed.is_owner());
        assert!(ed.begin_edit().is_err());
        assert!(ed.set_field(ProfileField::Email, "x@example.com").is_err());
        assert!(ed.save().await.is_err());
        assert_eq!(store.get(&claim_key("ada")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_claim_then_edit() {
        let source = Arc::new(MemoryProfiles::new());
        seed(&source, "ada").await;
        let store = Arc::new(MemoryStore::new());
        let mut ed = editor(source.clone(), store, OwnershipPolicy::BindOnFirstView);

        ed.open(Some("ada")).await;
        assert!(ed.decision().unwrap().claimable);
        assert!(ed.claim().unwrap().is_owner);

        ed.begin_edit().unwrap();
        ed.set_field(ProfileField::Location, "London").unwrap();
        ed.save().await.unwrap();

        let stored = source.fetch_profile("ada").await.unwrap();
        assert_eq!(stored.location.as_deref(), Some("London"));
    }

    #[tokio::test]
    async fn test_cancel_restores_snapshot() {
        let source = Arc::new(MemoryProfiles::new());
        let original = seed(&source, "ada").await;
        let mut ed = editor(source, Arc::new(MemoryStore::new()), OwnershipPolicy::BindOnFirstView);

        ed.open(Some("ada")).await;
        ed.claim().unwrap();
        ed.begin_edit().unwrap();
        ed.set_field(ProfileField::Email, "changed@example.com").unwrap();
        ed.cancel_edit();

        assert_eq!(ed.record(), Some(&original));
        assert!(!ed.is_editing());
    }

    #[tokio::test]
    async fn test_device_match_save_stamps_owner() {
        let source = Arc::new(MemoryProfiles::new());
        let store = Arc::new(MemoryStore::new());
        let mut ed = editor(source.clone(), store.clone(), OwnershipPolicy::DeviceMatch);

        ed.create();
        ed.set_field(ProfileField::Name, "Ada").unwrap();
        let saved = ed.save().await.unwrap();

        let device = Ownership::new(store, OwnershipOptions::default()).device_id().unwrap();
        assert_eq!(saved.owner_device.as_deref(), Some(device.as_str()));
        assert!(ed.is_owner());

        let stranger = Arc::new(MemoryStore::new());
        let mut other = editor(source, stranger, OwnershipPolicy::DeviceMatch);
        other.open(saved.key()).await;
        assert!(!other.is_owner());
        assert!(other.claim().map(|d| !d.is_owner).unwrap());
    }

    #[tokio::test]
    async fn test_open_missing_and_pending() {
        let mut ed = editor(
            Arc::new(MemoryProfiles::new()),
            Arc::new(MemoryStore::new()),
            OwnershipPolicy::BindOnFirstView,
        );
        assert_eq!(ed.open(None).await, Resolution::Pending);
        assert_eq!(ed.open(Some("ghost")).await, Resolution::NotFound);
        assert!(ed.record().is_none());
        assert!(ed.contact_card().is_none());
    }

    #[tokio::test]
    async fn test_artifacts() {
        let source = Arc::new(MemoryProfiles::new());
        seed(&source, "ada").await;
        let mut ed = editor(source, Arc::new(MemoryStore::new()), OwnershipPolicy::BindOnFirstView);
        ed.open(Some("ada")).await;

        assert_eq!(ed.contact_file_name().as_deref(), Some("Ada_Lovelace.vcf"));
        assert!(ed.contact_card().unwrap().contains("EMAIL:ada@example.com"));
        let links = ed.contact_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href.as_str(), "mailto:ada@example.com");
        assert_eq!(
            ed.qr_payload().unwrap().as_str(),
            "https://cards.example.com/u/ada"
        );
        assert!(ed
            .qr_image_url()
            .unwrap()
            .as_str()
            .starts_with("https://api.qrserver.com/v1/create-qr-code/?size=200x200&data="));

        ed.create();
        assert!(ed.qr_payload().unwrap().as_str().starts_with("BEGIN:VCARD"));
        assert!(ed.contact_links().is_empty());
    }

    #[tokio::test]
    async fn test_owner_must_be_editing_to_save() {
        let source = Arc::new(MemoryProfiles::new());
        seed(&source, "ada").await;
        let mut ed = editor(source.clone(), Arc::new(MemoryStore::new()), OwnershipPolicy::BindOnFirstView);

        ed.open(Some("ada")).await;
        ed.claim().unwrap();
        assert!(ed.is_owner() && !ed.is_editing());
        assert_eq!(ed.save().await.unwrap_err().kind(), crate::error::ErrorKind::Validation);

        ed.begin_edit().unwrap();
        assert!(ed.save().await.is_ok());
        assert!(!ed.is_editing());
    }

    #[test]
    fn test_malformed_draft_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(DRAFT_KEY, "{not json").unwrap();
        let ed = editor(Arc::new(MemoryProfiles::new()), store, OwnershipPolicy::BindOnFirstView);
        assert_eq!(ed.last_draft(), None);
    }
}
