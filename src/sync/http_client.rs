//! HTTP transport for the ranked API
//!
//! The dispatcher talks to a [`Transport`] so tests can replace the network
//! with a scripted one. [`ReqwestTransport`] is the production implementation;
//! it attaches the API key and maps client failures onto [`TransportError`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{AppError, TransportError};

/// Outbound request as seen by the dispatcher
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Optional body
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// GET request without body
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// POST request with a body
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body.into()),
        }
    }
}

/// Response returned by a [`Transport`]
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Full body
    pub body: Bytes,
}

impl ApiResponse {
    /// Response with the given status, no headers and empty body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Something that can put a request on the wire
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the complete response
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport that authenticates every request
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    key_header: Option<(HeaderName, HeaderValue)>,
}

impl ReqwestTransport {
    /// Build a transport from API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_client(client, config)
    }

    /// Build a transport around an existing client
    pub fn with_client(client: Client, config: &ApiConfig) -> Result<Self, AppError> {
        let key_header = match &config.api_key {
            Some(key) => {
                let name = HeaderName::from_bytes(config.key_header.as_bytes()).map_err(|e| {
                    AppError::Config(format!("Invalid key header {:?}: {}", config.key_header, e))
                })?;
                let mut value = HeaderValue::from_str(key)
                    .map_err(|e| AppError::Config(format!("Invalid API key: {}", e)))?;
                value.set_sensitive(true);
                Some((name, value))
            }
            None => None,
        };

        Ok(Self { client, key_header })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some((name, value)) = &self.key_header {
            builder = builder.header(name.clone(), value.clone());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "Sending HTTP request");

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            url = %request.url,
            status = status.as_u16(),
            body_size = body.len(),
            "Received response"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
