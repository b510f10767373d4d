//! Remote template transport types

use futures_util::future::LocalBoxFuture;
use thiserror::Error;

/// Transport-level failure; absorbed by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error for {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Statuses that make the resolver follow the `Location` header
pub const REDIRECT_STATUSES: [u16; 4] = [301, 302, 307, 308];

/// Options attached to an outgoing template request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub with_credentials: bool,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            with_credentials: true,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

/// HTTP transport used to fetch remote templates
///
/// Implementations must not follow redirects themselves.
pub trait HttpClient {
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> LocalBoxFuture<'static, Result<Response, TransportError>>;
}

/// Customizes outgoing requests and response parsing for remote templates
pub trait RemoteTemplateFactory {
    fn build_request_options(&self) -> RequestOptions;

    fn parse_response(&self, response: &Response) -> String {
        response.text().to_string()
    }
}

/// Factory with fixed request options and raw-text parsing
#[derive(Debug, Clone, Default)]
pub struct FixedRequestFactory {
    pub options: RequestOptions,
}

impl RemoteTemplateFactory for FixedRequestFactory {
    fn build_request_options(&self) -> RequestOptions {
        self.options.clone()
    }
}
