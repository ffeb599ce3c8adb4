//! HTTP client for CardDAV operations.
//!
//! Implements [`Transport`] on top of reqwest. Basic authentication is sent
//! on every request; there is no challenge round trip.

use reqwest::{Client, Method, redirect};
use tracing::trace;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::auth::Credentials;
use super::config::CardDavConfig;
use super::transport::{DavRequest, DavResponse, Transport};

/// HTTP client for CardDAV operations.
pub struct CardDavClient {
    /// Client that follows redirects.
    client: Client,
    /// Client that hands 3xx responses back to the caller.
    manual: Client,
    credentials: Option<Credentials>,
}

impl CardDavClient {
    /// Creates a new client from the configuration.
    pub fn new(config: &CardDavConfig) -> ProviderResult<Self> {
        let credentials = match (&config.username, &config.password) {
            (Some(u), Some(p)) => Some(Credentials::new(u, p)),
            _ => None,
        };

        Ok(Self {
            client: build_client(config, redirect::Policy::limited(10))?,
            manual: build_client(config, redirect::Policy::none())?,
            credentials,
        })
    }

    async fn execute(&self, request: DavRequest) -> ProviderResult<DavResponse> {
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|_| {
            ProviderError::internal(format!("Invalid HTTP method: {}", request.method))
        })?;

        let http = if request.follow_redirects {
            &self.client
        } else {
            &self.manual
        };

        let mut builder = http.request(method, request.url.clone());

        if let Some(ref creds) = self.credentials {
            builder = builder.header("Authorization", creds.header_value());
        }
        if let Some(depth) = request.depth {
            builder = builder.header("Depth", depth.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder
                .header("Content-Type", "application/xml; charset=utf-8")
                .body(body);
        }

        trace!(method = %request.method, url = %request.url, "Sending request");

        let response = builder.send().await.map_err(|e| transport_error(&request.url, e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        trace!(status, bytes = body.len(), "Received response");

        Ok(DavResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for CardDavClient {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, ProviderResult<DavResponse>> {
        Box::pin(self.execute(request))
    }
}

fn build_client(config: &CardDavConfig, policy: redirect::Policy) -> ProviderResult<Client> {
    Client::builder()
        .danger_accept_invalid_certs(!config.verify_tls)
        .user_agent(&config.user_agent)
        .redirect(policy)
        .build()
        .map_err(|e| {
            ProviderError::network(format!("Failed to create HTTP client: {}", e)).with_source(e)
        })
}

fn transport_error(url: &url::Url, err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("Request to {} timed out", url)
    } else if err.is_connect() {
        format!("Could not connect to {}", url)
    } else {
        format!("Request to {} failed: {}", url, err)
    };
    ProviderError::network(message).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carddav::transport::Depth;
    use crate::error::ProviderErrorCode;
    use std::time::Duration;

    #[test]
    fn client_creation() {
        let config = CardDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("user", "pass");
        let client = CardDavClient::new(&config).unwrap();
        assert!(client.credentials.is_some());
    }

    #[test]
    fn client_without_credentials() {
        let config = CardDavConfig::new("https://dav.example.com/").unwrap();
        let client = CardDavClient::new(&config).unwrap();
        assert!(client.credentials.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let config = CardDavConfig::new("http://127.0.0.1:9/").unwrap();
        let client = CardDavClient::new(&config).unwrap();
        let req = DavRequest::propfind(config.url.clone(), Depth::Zero, "<x/>")
            .with_timeout(Duration::from_secs(2));

        let err = client.send(req).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert!(err.is_retryable());
    }
}
