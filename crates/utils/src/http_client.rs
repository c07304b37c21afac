//! Thin layer over `reqwest` shared by the service clients.
//!
//! A built [`HttpClient`] owns the base URL and the headers every request
//! carries; [`RequestBuilder`] composes one request on top of it (path
//! segments, query parameters, JSON body or multipart form) and sends it.
//! The layer stays agnostic to response shapes; callers parse.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use tracing::debug;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("Base URL cannot be a base")]
    BaseUrlCannotBeABase,
    #[error("Failed to serialize request body: {0}")]
    BodySerialization(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("Invalid MIME type for file part: {0}")]
    InvalidMime(#[source] reqwest::Error),
}

/// Reusable HTTP client bound to one service base URL.
pub struct HttpClient {
    base_url: Url,
    client: Client,
    default_headers: HeaderMap,
}

impl HttpClient {
    pub fn builder(base_url: &str) -> Result<HttpClientBuilder, HttpClientError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(HttpClientError::BaseUrlCannotBeABase);
        }
        Ok(HttpClientBuilder { base_url, default_headers: HeaderMap::new() })
    }

    /// Start composing a request against the base URL.
    pub fn request(&self) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method: Method::GET,
            url: self.base_url.clone(),
            headers: HeaderMap::new(),
            form: None,
            body: None,
        }
    }
}

pub struct HttpClientBuilder {
    base_url: Url,
    default_headers: HeaderMap,
}

impl HttpClientBuilder {
    /// Header attached to every request built from the client.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn build(self) -> Result<HttpClient, HttpClientError> {
        let client = Client::builder().build().map_err(HttpClientError::ClientBuild)?;
        Ok(HttpClient { base_url: self.base_url, client, default_headers: self.default_headers })
    }
}

/// Single-use request composer. Consumed by [`RequestBuilder::send`].
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    url: Url,
    headers: HeaderMap,
    form: Option<Form>,
    body: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Append one path segment. Invalid segments are ignored rather than
    /// panicking; the server rejects the malformed request instead.
    pub fn path(mut self, segment: &str) -> Self {
        if let Ok(mut segments) = self.url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        self
    }

    pub fn query_param(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => self.header(reqwest::header::AUTHORIZATION, value),
            Err(_) => self,
        }
    }

    /// Add a text field to the multipart form.
    pub fn form_text(mut self, key: &str, value: &str) -> Self {
        self.form = Some(self.form.take().unwrap_or_default().text(key.to_string(), value.to_string()));
        self
    }

    /// Add an in-memory file part to the multipart form.
    pub fn form_file_bytes(
        mut self,
        key: &str,
        bytes: Vec<u8>,
        file_name: &str,
        mime: Option<&str>,
    ) -> Result<Self, HttpClientError> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(mime) = mime {
            part = part.mime_str(mime).map_err(HttpClientError::InvalidMime)?;
        }
        self.form = Some(self.form.take().unwrap_or_default().part(key.to_string(), part));
        Ok(self)
    }

    /// Set a JSON body. Mutually exclusive with the form methods; a form,
    /// when present, wins at send time.
    pub fn body<T: Serialize>(mut self, body: T) -> Result<Self, HttpClientError> {
        self.body = Some(serde_json::to_string(&body)?);
        Ok(self)
    }

    pub async fn send(self) -> Result<Response, reqwest::Error> {
        debug!(method = %self.method, url = %self.url, "Sending request");

        let mut request = self
            .client
            .client
            .request(self.method, self.url)
            .headers(self.client.default_headers.clone())
            .headers(self.headers);

        if let Some(form) = self.form {
            request = request.multipart(form);
        } else if let Some(body) = self.body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        request.send().await
    }
}

/// Best-effort extraction of an error body for diagnostics. Returns the
/// response text (or a placeholder when the body cannot be read) alongside
/// the status it came with.
pub async fn extract_http_error_text(response: Response, operation: &str) -> (String, StatusCode) {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.is_empty() => (text, status),
        Ok(_) => ("<empty body>".to_string(), status),
        Err(e) => {
            debug!(operation = operation, error = %e, "Failed to read error response body");
            ("<unreadable body>".to_string(), status)
        }
    }
}
