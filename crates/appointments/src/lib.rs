//! Appointment booking for cardlink
//!
//! This crate provides the booking form state machine and the client that
//! submits appointment requests to the card backend.

mod form;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use form::{AppointmentDraft, AppointmentForm, FormState, PAST_DATE_MESSAGE};

/// Error type for appointment booking
#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Booking rejected: {0}")]
    Rejected(String),

    #[error("Invalid form state: {0}")]
    State(String),

    #[error("Request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppointmentError>;

/// A request for a meeting slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub name: String,
    pub email: String,
    /// Desired day, sent as `YYYY-MM-DD`
    pub date: NaiveDate,
    /// Desired time of day, sent as `HH:MM`
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
}

impl AppointmentRequest {
    /// The requested slot as a single local timestamp
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Check the slot lies strictly after `now`
    pub fn check_future(&self, now: NaiveDateTime) -> Result<()> {
        if self.starts_at() > now {
            Ok(())
        } else {
            Err(AppointmentError::Validation(PAST_DATE_MESSAGE.to_string()))
        }
    }
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(de::Error::custom)
    }
}

/// What the backend returns for an accepted booking
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookingReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client for the appointments endpoint
#[derive(Clone)]
pub struct AppointmentsClient {
    base_url: Url,
    http_client: Client,
}

impl AppointmentsClient {
    /// Create a new appointments client
    pub fn new(base_url: &str, http_client: Client) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http_client,
        })
    }

    fn appointments_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppointmentError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .push("appointments");
        Ok(url)
    }

    /// Submit a booking request
    ///
    /// The slot is not re-validated here; [`AppointmentForm`] does that
    /// against the submission time.
    pub async fn book(&self, request: &AppointmentRequest) -> Result<BookingReceipt> {
        let url = self.appointments_url()?;
        debug!("POST {} for {}", url, request.starts_at());

        let response = self.http_client.post(url).json(request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = rejection_message(&text)
                .unwrap_or_else(|| format!("booking failed with status {}", status));
            warn!("booking rejected ({}): {}", status, message);
            return Err(AppointmentError::Rejected(message));
        }

        info!("booked {} for {}", request.starts_at(), request.email);
        Ok(receipt_from(&text))
    }
}

/// Read an accepted booking's reply
///
/// The booking already went through, so a body that is not a receipt is
/// kept as the receipt's message instead of failing the request.
fn receipt_from(body: &str) -> BookingReceipt {
    let body = body.trim();
    if body.is_empty() {
        return BookingReceipt::default();
    }

    serde_json::from_str(body).unwrap_or_else(|e| {
        debug!("booking reply is not a receipt ({}), keeping it as text", e);
        BookingReceipt {
            message: Some(body.to_string()),
            ..Default::default()
        }
    })
}

fn rejection_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string),
        Err(_) => Some(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> AppointmentRequest {
        AppointmentRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_wire_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(
            value,
            json!({"name": "Ada", "email": "ada@example.com", "date": "2026-10-20", "time": "14:30"})
        );

        let with_seconds: AppointmentRequest = serde_json::from_value(
            json!({"name": "Ada", "email": "ada@example.com", "date": "2026-10-20", "time": "14:30:00"}),
        )
        .unwrap();
        assert_eq!(with_seconds, request());
    }

    #[test]
    fn test_receipt_from_reply_bodies() {
        assert_eq!(receipt_from(""), BookingReceipt::default());
        assert_eq!(
            receipt_from(r#"{"id":"apt-1","message":"See you then"}"#),
            BookingReceipt {
                id: Some("apt-1".to_string()),
                message: Some("See you then".to_string()),
            }
        );
        assert_eq!(receipt_from("OK\n").message.as_deref(), Some("OK"));
    }

    #[test]
    fn test_check_future_is_strict() {
        let req = request();
        assert!(req.check_future(req.starts_at()).is_err());
        assert!(req.check_future(req.starts_at() - chrono::Duration::minutes(1)).is_ok());
        assert!(req.check_future(req.starts_at() + chrono::Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(rejection_message(r#"{"message":"Slot taken"}"#).as_deref(), Some("Slot taken"));
        assert_eq!(rejection_message("closed on Sundays").as_deref(), Some("closed on Sundays"));
        assert_eq!(rejection_message(r#"{"code":42}"#), None);
        assert_eq!(rejection_message(""), None);
    }

    #[test]
    fn test_appointments_url() {
        let client = AppointmentsClient::new("http://localhost:3000/", Client::new()).unwrap();
        assert_eq!(
            client.appointments_url().unwrap().as_str(),
            "http://localhost:3000/api/appointments"
        );
    }
}
