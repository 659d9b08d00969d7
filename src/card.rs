//! Contact artifacts: the downloadable contact card and the scannable-code payload

use log::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::profile::{ProfileField, ProfileRecord};

/// Render the plain-text contact card for a record
///
/// Exactly four fields are substituted, always in the same order; a missing
/// field leaves its line with an empty value. Values are inserted verbatim,
/// so a value containing a line break or a `;` will corrupt the card.
pub fn contact_card(record: &ProfileRecord) -> String {
    let field = |value: &Option<String>| value.as_deref().unwrap_or_default().to_string();

    [
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!("FN:{}", field(&record.name)),
        format!("TITLE:{}", field(&record.title)),
        format!("EMAIL:{}", field(&record.email)),
        format!("URL:{}", field(&record.website)),
        "END:VCARD".to_string(),
    ]
    .join("\n")
}

/// Download name for a record's contact card
///
/// The display name with spaces turned into `_`; a card without a name
/// falls back to its username, then to `contact`.
pub fn contact_file_name(record: &ProfileRecord) -> String {
    let stem = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.replace(' ', "_"))
        .or_else(|| record.key().map(str::to_string))
        .unwrap_or_else(|| "contact".to_string());
    format!("{}.vcf", stem)
}

/// One tappable contact row on a card's public page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLink {
    pub field: ProfileField,
    pub label: &'static str,
    /// The value as shown
    pub value: String,
    pub href: Url,
}

/// Build the contact rows for a record
///
/// Rows come out in display order. Fields without a value are skipped, as
/// is a website that does not parse as a URL even with `https://` in front.
pub fn contact_links(record: &ProfileRecord) -> Vec<ContactLink> {
    let rows = [
        (ProfileField::Email, "Email"),
        (ProfileField::Instagram, "Instagram"),
        (ProfileField::Linkedin, "LinkedIn"),
        (ProfileField::Twitter, "Twitter"),
        (ProfileField::Website, "Website"),
        (ProfileField::Location, "Location"),
        (ProfileField::PaymentHandle, "UPI"),
    ];

    rows.into_iter()
        .filter_map(|(field, label)| {
            let value = record.get(field).filter(|v| !v.is_empty())?;
            let href = match contact_href(field, value) {
                Some(href) => href,
                None => {
                    debug!("no link for {} value {:?}", field, value);
                    return None;
                }
            };
            Some(ContactLink {
                field,
                label,
                value: value.to_string(),
                href,
            })
        })
        .collect()
}

fn contact_href(field: ProfileField, value: &str) -> Option<Url> {
    match field {
        ProfileField::Email => Url::parse(&format!("mailto:{}", value)).ok(),
        ProfileField::Instagram => profile_url("https://instagram.com/", &value.replacen('@', "", 1)),
        ProfileField::Linkedin => profile_url("https://linkedin.com/in/", value),
        ProfileField::Twitter => profile_url("https://twitter.com/", &value.replacen('@', "", 1)),
        ProfileField::Website => Url::parse(value)
            .or_else(|_| Url::parse(&format!("https://{}", value)))
            .ok(),
        ProfileField::Location => with_query("https://maps.google.com/", "q", value),
        ProfileField::PaymentHandle => with_query("upi://pay", "pa", value),
        _ => None,
    }
}

fn profile_url(base: &str, handle: &str) -> Option<Url> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(handle);
    Some(url)
}

fn with_query(base: &str, key: &str, value: &str) -> Option<Url> {
    let mut url = Url::parse(base).ok()?;
    url.query_pairs_mut().append_pair(key, value);
    Some(url)
}

/// Text to encode in a scannable code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload(String);

impl QrPayload {
    /// Encode the full contact card
    pub fn contact(record: &ProfileRecord) -> Self {
        Self(contact_card(record))
    }

    /// Encode a link to the card's public page
    pub fn profile_link(share_base: &Url, key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::validation("cannot link to a card without a username"));
        }

        let mut url = share_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("{} cannot be a base URL", share_base)))?
            .pop_if_empty()
            .push("u")
            .push(key);
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Image URL rendering this payload through a code-image service
    pub fn image_url(&self, service: &Url, size: u32) -> Url {
        let mut url = service.clone();
        url.query_pairs_mut()
            .append_pair("size", &format!("{}x{}", size, size))
            .append_pair("data", &self.0);
        url
    }
}

impl AsRef<str> for QrPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
