//! Configuration options for the cardlink client

use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::ownership::{OwnershipOptions, OwnershipPolicy};

/// Default image service used to render scannable codes
pub const DEFAULT_QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Configuration options for the cardlink client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the profile backend
    pub base_url: Url,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Image service that renders scannable codes
    pub qr_service_url: Url,

    /// Edge length of the rendered code, in pixels
    pub qr_size: u32,

    /// Base URL used for shareable profile links
    pub share_base_url: Option<Url>,

    /// How device ownership of a card is decided
    pub ownership: OwnershipOptions,
}

impl ClientOptions {
    /// Create options for the given backend base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("{} cannot be used as a base URL", base_url)));
        }

        Ok(Self {
            base_url,
            request_timeout: Some(Duration::from_secs(10)),
            qr_service_url: Url::parse(DEFAULT_QR_SERVICE_URL)?,
            qr_size: 200,
            share_base_url: None,
            ownership: OwnershipOptions::default(),
        })
    }

    /// Build options from `CARDLINK_*` environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let base_url = std::env::var("CARDLINK_API_URL").map_err(|_| {
            Error::config("CARDLINK_API_URL environment variable not found")
        })?;
        let mut options = Self::new(&base_url)?;

        if let Ok(secs) = std::env::var("CARDLINK_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::config(format!("invalid CARDLINK_TIMEOUT_SECS: {}", secs)))?;
            options = options.with_request_timeout(Some(Duration::from_secs(secs)));
        }

        if let Ok(policy) = std::env::var("CARDLINK_OWNERSHIP") {
            options = options.with_ownership_policy(policy.parse()?);
        }

        if let Ok(flag) = std::env::var("CARDLINK_AUTO_CLAIM") {
            let flag: bool = flag
                .parse()
                .map_err(|_| Error::config(format!("invalid CARDLINK_AUTO_CLAIM: {}", flag)))?;
            options = options.with_auto_claim_on_view(flag);
        }

        Ok(options)
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the image service for scannable codes
    pub fn with_qr_service_url(mut self, value: &str) -> Result<Self> {
        self.qr_service_url = Url::parse(value)?;
        Ok(self)
    }

    /// Set the rendered code size
    pub fn with_qr_size(mut self, value: u32) -> Self {
        self.qr_size = value;
        self
    }

    /// Set the base URL used for shareable profile links
    pub fn with_share_base_url(mut self, value: &str) -> Result<Self> {
        self.share_base_url = Some(Url::parse(value)?);
        Ok(self)
    }

    /// Set the ownership policy
    pub fn with_ownership_policy(mut self, value: OwnershipPolicy) -> Self {
        self.ownership.policy = value;
        self
    }

    /// Opt in to claiming unclaimed cards as soon as they are viewed
    pub fn with_auto_claim_on_view(mut self, value: bool) -> Self {
        self.ownership.auto_claim_on_view = value;
        self
    }

    /// The base URL for profile links, falling back to the API base
    pub fn share_base(&self) -> &Url {
        self.share_base_url.as_ref().unwrap_or(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new("http://localhost:3000").unwrap();
        assert_eq!(options.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.qr_size, 200);
        assert_eq!(options.ownership.policy, OwnershipPolicy::BindOnFirstView);
        assert!(!options.ownership.auto_claim_on_view);
        assert_eq!(options.share_base().as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(ClientOptions::new("mailto:someone@example.com").is_err());
        assert!(ClientOptions::new("not a url").is_err());
    }

    #[test]
    fn test_builders() {
        let options = ClientOptions::new("http://localhost:3000")
            .unwrap()
            .with_ownership_policy(OwnershipPolicy::DeviceMatch)
            .with_auto_claim_on_view(true)
            .with_share_base_url("https://cards.example.com")
            .unwrap();

        assert_eq!(options.ownership.policy, OwnershipPolicy::DeviceMatch);
        assert!(options.ownership.auto_claim_on_view);
        assert_eq!(options.share_base().as_str(), "https://cards.example.com/");
    }
}
