//! Types for profile records

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One shareable contact card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Route key; unique within the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Avatar image, either a URL or a `data:` URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// UPI payment address, such as `alex@upi`
    #[serde(rename = "upi", alias = "paymentHandle", skip_serializing_if = "Option::is_none")]
    pub payment_handle: Option<String>,

    /// Identifier of the device that owns this card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_device: Option<String>,
}

impl ProfileRecord {
    /// Create an empty record with the given display name
    pub fn with_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// The route key, if one has been assigned
    pub fn key(&self) -> Option<&str> {
        self.username.as_deref().filter(|k| !k.is_empty())
    }

    /// Assign a generated identifier if the record has none yet
    ///
    /// Returns the identifier the record ends up with.
    pub fn ensure_username(&mut self) -> &str {
        if self.key().is_none() {
            self.username = Some(generate_username(self.name.as_deref().unwrap_or("")));
        }
        self.username.as_deref().unwrap_or_default()
    }

    /// Check the record is acceptable at the API boundary
    ///
    /// Savers call this before generating an identifier, so a card with
    /// neither a name nor a username is refused rather than saved blank.
    pub fn validate(&self) -> Result<()> {
        if let Some(username) = &self.username {
            if username.is_empty() {
                return Err(Error::validation("username must not be empty"));
            }
            if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(Error::validation(format!(
                    "username {:?} may only contain letters, digits, '-' and '_'",
                    username
                )));
            }
        }

        let has_name = self.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if self.key().is_none() && !has_name {
            return Err(Error::validation("a card needs a name or a username"));
        }

        Ok(())
    }

    /// Read an editable field
    pub fn get(&self, field: ProfileField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Write an editable field; an empty value clears it
    pub fn set(&mut self, field: ProfileField, value: &str) {
        let value = value.trim();
        *self.slot_mut(field) = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
    }

    fn slot(&self, field: ProfileField) -> &Option<String> {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::Title => &self.title,
            ProfileField::Subtitle => &self.subtitle,
            ProfileField::Avatar => &self.avatar,
            ProfileField::Email => &self.email,
            ProfileField::Instagram => &self.instagram,
            ProfileField::Linkedin => &self.linkedin,
            ProfileField::Twitter => &self.twitter,
            ProfileField::Website => &self.website,
            ProfileField::Location => &self.location,
            ProfileField::PaymentHandle => &self.payment_handle,
        }
    }

    fn slot_mut(&mut self, field: ProfileField) -> &mut Option<String> {
        match field {
            ProfileField::Name => &mut self.name,
            ProfileField::Title => &mut self.title,
            ProfileField::Subtitle => &mut self.subtitle,
            ProfileField::Avatar => &mut self.avatar,
            ProfileField::Email => &mut self.email,
            ProfileField::Instagram => &mut self.instagram,
            ProfileField::Linkedin => &mut self.linkedin,
            ProfileField::Twitter => &mut self.twitter,
            ProfileField::Website => &mut self.website,
            ProfileField::Location => &mut self.location,
            ProfileField::PaymentHandle => &mut self.payment_handle,
        }
    }
}

/// Fields an owner can edit
///
/// The identifier and the owner marker are managed by the client and are
/// deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Name,
    Title,
    Subtitle,
    Avatar,
    Email,
    Instagram,
    Linkedin,
    Twitter,
    Website,
    Location,
    PaymentHandle,
}

impl ProfileField {
    /// Every editable field, in display order
    pub const ALL: [ProfileField; 11] = [
        ProfileField::Name,
        ProfileField::Title,
        ProfileField::Subtitle,
        ProfileField::Avatar,
        ProfileField::Email,
        ProfileField::Instagram,
        ProfileField::Linkedin,
        ProfileField::Twitter,
        ProfileField::Website,
        ProfileField::Location,
        ProfileField::PaymentHandle,
    ];

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Title => "title",
            ProfileField::Subtitle => "subtitle",
            ProfileField::Avatar => "avatar",
            ProfileField::Email => "email",
            ProfileField::Instagram => "instagram",
            ProfileField::Linkedin => "linkedin",
            ProfileField::Twitter => "twitter",
            ProfileField::Website => "website",
            ProfileField::Location => "location",
            ProfileField::PaymentHandle => "upi",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProfileField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown profile field: {}", s)))
    }
}

/// Lowercase, hyphen-separated form of a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Derive an identifier from a display name plus a random suffix
///
/// The suffix narrows but does not rule out collisions; the backend is
/// not consulted.
pub fn generate_username(name: &str) -> String {
    let mut slug = slugify(name);
    if slug.is_empty() {
        slug.push_str("card");
    }

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();

    format!("{}-{}", slug, suffix)
}

/// Embed image bytes as a `data:` URI suitable for [`ProfileRecord::avatar`]
pub fn avatar_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_is_camel_case_and_sparse() {
        let record = ProfileRecord {
            username: Some("ada".to_string()),
            name: Some("Ada Lovelace".to_string()),
            payment_handle: Some("ada@upi".to_string()),
            owner_device: Some("dev-1".to_string()),
            ..Default::default()
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "username": "ada",
                "name": "Ada Lovelace",
                "upi": "ada@upi",
                "ownerDevice": "dev-1"
            })
        );

        let back: ProfileRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_payment_handle_reads_upi_and_legacy_name() {
        let record: ProfileRecord =
            serde_json::from_value(json!({"username": "alex", "upi": "alex@upi"})).unwrap();
        assert_eq!(record.payment_handle.as_deref(), Some("alex@upi"));

        let legacy: ProfileRecord =
            serde_json::from_value(json!({"username": "alex", "paymentHandle": "alex@upi"})).unwrap();
        assert_eq!(legacy, record);
        assert_eq!(record.get(ProfileField::PaymentHandle), Some("alex@upi"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let record: ProfileRecord =
            serde_json::from_value(json!({"username": "ada", "theme": "dark"})).unwrap();
        assert_eq!(record.key(), Some("ada"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ada Lovelace"), "ada-lovelace");
        assert_eq!(slugify("  J. R. R. Tolkien!  "), "j-r-r-tolkien");
        assert_eq!(slugify("Zoë"), "zo");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_generate_username_shape() {
        let username = generate_username("Ada Lovelace");
        let suffix = username.strip_prefix("ada-lovelace-").unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        assert!(generate_username("").starts_with("card-"));
    }

    #[test]
    fn test_ensure_username_keeps_existing() {
        let mut record = ProfileRecord::with_name("Ada");
        record.username = Some("ada".to_string());
        assert_eq!(record.ensure_username(), "ada");

        let mut fresh = ProfileRecord::with_name("Ada");
        let generated = fresh.ensure_username().to_string();
        assert!(generated.starts_with("ada-"));
        assert_eq!(fresh.key(), Some(generated.as_str()));
    }

    #[test]
    fn test_validate() {
        assert!(ProfileRecord::with_name("Ada").validate().is_ok());
        assert!(ProfileRecord::default().validate().is_err());

        let mut bad = ProfileRecord::with_name("Ada");
        bad.username = Some("ada/../admin".to_string());
        assert!(bad.validate().is_err());

        bad.username = Some(String::new());
        assert!(bad.validate().is_err());

        let blank_name = ProfileRecord::with_name("   ");
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn test_set_and_get_fields() {
        let mut record = ProfileRecord::default();
        record.set(ProfileField::Email, " ada@example.com ");
        assert_eq!(record.get(ProfileField::Email), Some("ada@example.com"));

        record.set(ProfileField::Email, "   ");
        assert_eq!(record.get(ProfileField::Email), None);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in ProfileField::ALL {
            assert_eq!(field.as_str().parse::<ProfileField>().unwrap(), field);
        }
        assert!("ownerDevice".parse::<ProfileField>().is_err());
    }

    #[test]
    fn test_avatar_data_uri() {
        assert_eq!(avatar_data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
