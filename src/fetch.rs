//! HTTP client abstraction for making requests to the card backend

use log::{debug, warn};
use reqwest::{header::{HeaderMap, HeaderValue}, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::error::Error;

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: Url, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        Self {
            client,
            url,
            method,
            headers,
            body: None,
        }
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(body)?;
        self.body = Some(json);
        Ok(self)
    }

    fn build(&self) -> RequestBuilder {
        let mut req = self.client.request(self.method.clone(), self.url.clone());
        req = req.headers(self.headers.clone());

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        req
    }

    /// Execute the request and return the body of a successful response
    ///
    /// Non-success statuses are folded into the crate's error taxonomy:
    /// 404 is [`Error::NotFound`], any other 4xx is [`Error::Validation`]
    /// carrying the server's message, and everything else is
    /// [`Error::Transient`].
    pub async fn execute_text(&self) -> Result<String, Error> {
        debug!("{} {}", self.method, self.url);

        let response = self.build().send().await.map_err(|e| {
            warn!("{} {} failed: {}", self.method, self.url, e);
            transport_error(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            return Ok(text);
        }

        let message = error_message(status, &text);
        warn!("{} {} returned {}: {}", self.method, self.url, status, message);

        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound(message),
            s if s.is_client_error() => Error::Validation(message),
            _ => Error::Transient(message),
        })
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let text = self.execute_text().await?;
        parse_body(&self.url, &text)
    }

    /// Like [`execute`](Self::execute), but a successful reply whose body is
    /// empty or `null` yields `None`
    pub async fn execute_optional<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        let text = self.execute_text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        parse_body(&self.url, &text)
    }
}

fn parse_body<T: DeserializeOwned>(url: &Url, text: &str) -> Result<T, Error> {
    serde_json::from_str(text)
        .map_err(|e| Error::transient(format!("malformed response from {}: {}", url, e)))
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transient("request timed out")
    } else {
        Error::transient(err)
    }
}

/// Pull a human-readable message out of an error body
///
/// Backends reply with `{"message": ...}` or `{"error": ...}`; anything
/// else is passed through as text, and an empty body falls back to the
/// status reason.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error"] {
            if let Some(msg) = value.get(field).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get(client: &Client, url: Url) -> FetchBuilder<'_> {
        FetchBuilder::new(client, url, Method::GET)
    }

    /// Create a POST request
    pub fn post(client: &Client, url: Url) -> FetchBuilder<'_> {
        FetchBuilder::new(client, url, Method::POST)
    }
}
