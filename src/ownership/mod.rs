//! Per-device edit rights over profile records
//!
//! Ownership is trust-on-first-use and lives entirely on the client: a
//! device proves nothing to the backend, it only remembers what it has
//! claimed. Two policies are supported:
//!
//! * [`OwnershipPolicy::BindOnFirstView`] keeps a claim token per card in
//!   the [`LocalStore`]. The first claim wins and is never overwritten.
//! * [`OwnershipPolicy::DeviceMatch`] compares the record's `ownerDevice`
//!   marker with this device's identifier. Claiming writes the marker into
//!   the record, to be persisted by the next save.
//!
//! [`Ownership::evaluate`] never writes. Claiming only happens through
//! [`Ownership::claim`], or through [`Ownership::on_view`] when
//! `auto_claim_on_view` has been switched on.

mod store;

use log::{debug, info, warn};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::profile::ProfileRecord;

pub use store::*;

/// How a device earns edit rights over a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipPolicy {
    /// A local claim token per card; first claim wins
    #[default]
    BindOnFirstView,
    /// The card's owner marker must equal this device's identifier
    DeviceMatch,
}

impl FromStr for OwnershipPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first-view" => Ok(OwnershipPolicy::BindOnFirstView),
            "device-match" => Ok(OwnershipPolicy::DeviceMatch),
            other => Err(Error::config(format!(
                "unknown ownership policy {:?} (expected first-view or device-match)",
                other
            ))),
        }
    }
}

/// Ownership settings
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipOptions {
    pub policy: OwnershipPolicy,

    /// Claim an unclaimed card as soon as this device views it
    ///
    /// Off by default. Turning it on makes the first visitor of a card its
    /// permanent owner.
    pub auto_claim_on_view: bool,
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// This device holds the claim
    ClaimedByThisDevice,
    /// Another device holds the claim
    ClaimedElsewhere,
    /// Nobody has claimed the card yet
    Unclaimed,
    /// The card has no identifier to claim under
    Unsaved,
    /// Local storage failed or held malformed data
    StorageUnavailable,
}

/// Outcome of evaluating edit rights for one card on this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipDecision {
    pub is_owner: bool,
    /// Whether an explicit claim would succeed
    pub claimable: bool,
    /// Whether the editor should open in edit mode
    pub edit_mode: bool,
    pub reason: DecisionReason,
}

impl OwnershipDecision {
    fn owner(record: &ProfileRecord) -> Self {
        let fresh = record.name.as_deref().map_or(true, |n| n.trim().is_empty());
        Self {
            is_owner: true,
            claimable: false,
            edit_mode: fresh,
            reason: DecisionReason::ClaimedByThisDevice,
        }
    }

    /// Decision for a card this device is creating
    pub(crate) fn creator() -> Self {
        Self {
            is_owner: true,
            claimable: false,
            edit_mode: true,
            reason: DecisionReason::ClaimedByThisDevice,
        }
    }

    fn unclaimed() -> Self {
        Self {
            is_owner: false,
            claimable: true,
            edit_mode: false,
            reason: DecisionReason::Unclaimed,
        }
    }

    fn denied(reason: DecisionReason) -> Self {
        Self {
            is_owner: false,
            claimable: false,
            edit_mode: false,
            reason,
        }
    }
}

/// Decides and records which cards this device may edit
#[derive(Clone)]
pub struct Ownership {
    store: Arc<dyn LocalStore>,
    options: OwnershipOptions,
}

impl Ownership {
    pub fn new(store: Arc<dyn LocalStore>, options: OwnershipOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &OwnershipOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Read a value, treating blank values as malformed
    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key)? {
            Some(value) if value.trim().is_empty() => {
                Err(Error::storage(format!("blank value under {}", key)))
            }
            other => Ok(other),
        }
    }

    /// This device's identifier, generating and storing one if needed
    pub fn device_id(&self) -> Result<String> {
        let generated = Uuid::new_v4().to_string();
        let id = match self.read(DEVICE_ID_KEY) {
            Ok(Some(id)) => return Ok(id),
            Ok(None) => self.store.set_if_absent(DEVICE_ID_KEY, &generated)?,
            Err(Error::Storage(msg)) => {
                warn!("replacing unusable device id: {}", msg);
                self.store.set(DEVICE_ID_KEY, &generated)?;
                generated.clone()
            }
            Err(e) => return Err(e),
        };

        if id == generated {
            info!("generated device id {}", id);
        }
        Ok(id)
    }

    /// Decide edit rights without touching storage
    ///
    /// Re-evaluating against unchanged storage always yields the same
    /// decision.
    pub fn evaluate(&self, record: &ProfileRecord) -> OwnershipDecision {
        let decision = match self.try_evaluate(record) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("ownership check failed, denying: {}", e);
                OwnershipDecision::denied(DecisionReason::StorageUnavailable)
            }
        };
        debug!(
            "ownership of {}: {:?}",
            record.key().unwrap_or("<unsaved>"),
            decision.reason
        );
        decision
    }

    fn try_evaluate(&self, record: &ProfileRecord) -> Result<OwnershipDecision> {
        let marker = match self.options.policy {
            OwnershipPolicy::BindOnFirstView => {
                let Some(key) = record.key() else {
                    return Ok(OwnershipDecision::denied(DecisionReason::Unsaved));
                };
                self.read(&claim_key(key))?
            }
            OwnershipPolicy::DeviceMatch => record
                .owner_device
                .clone()
                .filter(|marker| !marker.trim().is_empty()),
        };

        let Some(marker) = marker else {
            return Ok(OwnershipDecision::unclaimed());
        };

        if self.read(DEVICE_ID_KEY)?.as_deref() == Some(marker.as_str()) {
            Ok(OwnershipDecision::owner(record))
        } else {
            Ok(OwnershipDecision::denied(DecisionReason::ClaimedElsewhere))
        }
    }

    /// Claim a card for this device
    ///
    /// An existing claim is never replaced: claiming a card another device
    /// already holds leaves storage and the record untouched and returns a
    /// denial. Under [`OwnershipPolicy::DeviceMatch`] the marker is only set
    /// on `record`; it reaches the backend with the next save.
    pub fn claim(&self, record: &mut ProfileRecord) -> Result<OwnershipDecision> {
        match self.options.policy {
            OwnershipPolicy::BindOnFirstView => {
                let key = record
                    .key()
                    .ok_or_else(|| Error::validation("save the card before claiming it"))?;
                let device = self.device_id()?;
                if self.store.set_if_absent(&claim_key(key), &device)? == device {
                    info!("device {} claimed {}", device, key);
                }
            }
            OwnershipPolicy::DeviceMatch => {
                let unmarked = record
                    .owner_device
                    .as_deref()
                    .map_or(true, |marker| marker.trim().is_empty());
                if unmarked {
                    let device = self.device_id()?;
                    info!(
                        "device {} claimed {}",
                        device,
                        record.key().unwrap_or("<unsaved>")
                    );
                    record.owner_device = Some(device);
                }
            }
        }

        Ok(self.evaluate(record))
    }

    /// Evaluate a card that has just been displayed
    ///
    /// Identical to [`Ownership::evaluate`] unless `auto_claim_on_view` is
    /// set, in which case an unclaimed card is claimed on the spot.
    pub fn on_view(&self, record: &mut ProfileRecord) -> OwnershipDecision {
        let decision = self.evaluate(record);
        if !(self.options.auto_claim_on_view && decision.claimable) {
            return decision;
        }

        match self.claim(record) {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!("auto-claim failed: {}", e);
                decision
            }
        }
    }
}
