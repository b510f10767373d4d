//! HTTP transport backed by reqwest

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use log::debug;

use crate::resolver::{HttpClient, RequestOptions, Response, TransportError};

/// Headers that only go out when the request carries credentials
const CREDENTIAL_HEADERS: [&str; 2] = ["authorization", "cookie"];

/// Fetches templates with a reqwest client that never follows redirects
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("dynamic-template/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
        let mut request = self.client.get(url);
        for (name, value) in outgoing_headers(options) {
            request = request.header(name.as_str(), value.as_str());
        }

        let url = url.to_string();
        async move {
            let transport_error = |e: reqwest::Error| TransportError {
                url: url.clone(),
                message: e.to_string(),
            };

            let response = request.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(transport_error)?;
            debug!("GET {} -> {} ({} bytes)", url, status, body.len());

            Ok(Response {
                status,
                headers,
                body,
            })
        }
        .boxed_local()
    }
}

/// Transport for hosts without network access; every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl HttpClient for OfflineClient {
    fn get(
        &self,
        url: &str,
        _options: &RequestOptions,
    ) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
        future::ready(Err(TransportError {
            url: url.to_string(),
            message: "network access is disabled".to_string(),
        }))
        .boxed_local()
    }
}

/// Request headers, minus credential headers when credentials are off
fn outgoing_headers(options: &RequestOptions) -> Vec<(String, String)> {
    options
        .headers
        .iter()
        .filter(|(name, _)| {
            options.with_credentials
                || !CREDENTIAL_HEADERS
                    .iter()
                    .any(|h| name.eq_ignore_ascii_case(h))
        })
        .cloned()
        .collect()
}
