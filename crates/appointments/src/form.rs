//! Booking form state machine

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::{AppointmentError, AppointmentRequest, AppointmentsClient, BookingReceipt, Result};

/// Message shown when the chosen slot is not in the future
pub const PAST_DATE_MESSAGE: &str = "Please choose a future date and time";

/// Where the form is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    /// Being filled in; carries the last validation or rejection message
    Composing { error: Option<String> },
    /// Accepted and waiting for the visitor to confirm
    Submitted(AppointmentRequest),
    /// Confirmed by the visitor
    Confirmed(AppointmentRequest),
}

/// Raw form inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub name: String,
    pub email: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl AppointmentDraft {
    /// Set the date from a `YYYY-MM-DD` input value
    pub fn set_date(&mut self, value: &str) -> Result<()> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| AppointmentError::Validation(format!("invalid date: {}", value)))?;
        self.date = Some(date);
        Ok(())
    }

    /// Set the time from an `HH:MM` input value
    pub fn set_time(&mut self, value: &str) -> Result<()> {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| AppointmentError::Validation(format!("invalid time: {}", value)))?;
        self.time = Some(time);
        Ok(())
    }

    /// Turn the inputs into a request whose slot lies after `now`
    pub fn to_request(&self, now: NaiveDateTime) -> Result<AppointmentRequest> {
        let missing = |what: &str| AppointmentError::Validation(format!("{} is required", what));

        let name = self.name.trim();
        if name.is_empty() {
            return Err(missing("name"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(missing("email"));
        }

        let request = AppointmentRequest {
            name: name.to_string(),
            email: email.to_string(),
            date: self.date.ok_or_else(|| missing("date"))?,
            time: self.time.ok_or_else(|| missing("time"))?,
        };
        request.check_future(now)?;
        Ok(request)
    }
}

/// One booking form: `Composing -> Submitted -> Confirmed`
///
/// Any failure on the way to `Submitted` leaves the form composing with
/// the failure message recorded.
#[derive(Debug, Clone)]
pub struct AppointmentForm {
    pub draft: AppointmentDraft,
    state: FormState,
}

impl Default for AppointmentForm {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentForm {
    pub fn new() -> Self {
        Self {
            draft: AppointmentDraft::default(),
            state: FormState::Composing { error: None },
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// The message to show next to the form, if any
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FormState::Composing { error } => error.as_deref(),
            _ => None,
        }
    }

    fn ensure_composing(&self) -> Result<()> {
        match self.state {
            FormState::Composing { .. } => Ok(()),
            _ => Err(AppointmentError::State(
                "the form has already been submitted".to_string(),
            )),
        }
    }

    fn fail(&mut self, err: AppointmentError) -> AppointmentError {
        let message = match &err {
            AppointmentError::Validation(m) | AppointmentError::Rejected(m) => m.clone(),
            other => other.to_string(),
        };
        self.state = FormState::Composing {
            error: Some(message),
        };
        err
    }

    /// Validate against `now` and move to `Submitted` without contacting a server
    pub fn submit(&mut self, now: NaiveDateTime) -> Result<&AppointmentRequest> {
        self.ensure_composing()?;

        let request = match self.draft.to_request(now) {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };

        debug!("appointment for {} submitted", request.starts_at());
        self.state = FormState::Submitted(request);
        match &self.state {
            FormState::Submitted(request) => Ok(request),
            _ => Err(AppointmentError::State("submission was lost".to_string())),
        }
    }

    /// Validate against `now`, book through `client` and move to `Submitted`
    pub async fn submit_to(
        &mut self,
        client: &AppointmentsClient,
        now: NaiveDateTime,
    ) -> Result<BookingReceipt> {
        self.ensure_composing()?;

        let request = match self.draft.to_request(now) {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };

        match client.book(&request).await {
            Ok(receipt) => {
                self.state = FormState::Submitted(request);
                Ok(receipt)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// [`AppointmentForm::submit_to`] using the local clock
    pub async fn submit_now(&mut self, client: &AppointmentsClient) -> Result<BookingReceipt> {
        self.submit_to(client, Local::now().naive_local()).await
    }

    /// Record the visitor's confirmation click
    ///
    /// Nothing is verified; the confirmation is self-attested.
    pub fn confirm(&mut self) -> Result<&AppointmentRequest> {
        let request = match &self.state {
            FormState::Submitted(request) => request.clone(),
            FormState::Confirmed(_) => {
                return Err(AppointmentError::State("already confirmed".to_string()))
            }
            FormState::Composing { .. } => {
                return Err(AppointmentError::State("nothing to confirm".to_string()))
            }
        };

        self.state = FormState::Confirmed(request);
        match &self.state {
            FormState::Confirmed(request) => Ok(request),
            _ => Err(AppointmentError::State("confirmation was lost".to_string())),
        }
    }

    /// Clear the inputs and start over
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
