//! Executing materialized requests over reqwest.

use crate::cookies::cookie_header;
use crate::error::{Error, Result};
use crate::types::{SendableBody, SendableRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use url::Url;

/// A received response with the body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_reason: Option<String>,
    pub headers: HashMap<String, String>,
    /// Final URL (after redirects)
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| Error::RequestError(format!("Response is not valid UTF-8: {e}")))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::BodyError(format!("Failed to deserialize response body: {e}")))
    }
}

/// Trait for sending materialized requests
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: SendableRequest) -> Result<HttpResponse>;
}

/// Reqwest-based implementation of [`HttpSender`].
pub struct ReqwestSender {
    client: Client,
    base_url: Option<Url>,
}

impl ReqwestSender {
    /// Create a sender with a default client.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().map_err(Error::Client)?;
        Ok(Self { client, base_url: None })
    }

    /// Create a sender with a custom client.
    pub fn with_client(client: Client) -> Self {
        Self { client, base_url: None }
    }

    /// Resolve relative request URLs against the given base.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        let base = Url::parse(base_url.as_ref())
            .map_err(|e| Error::invalid_argument("base_url", format!("invalid base URL: {e}")))?;
        self.base_url = Some(base);
        Ok(self)
    }

    fn request_url(&self, url: &str) -> Result<Url> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|e| Error::RequestError(format!("Invalid request URL `{url}`: {e}")))
    }

    /// Turn a descriptor into a concrete reqwest request, dispatching the
    /// body over its variants.
    pub fn build_request(&self, request: SendableRequest) -> Result<reqwest::Request> {
        let url = self.request_url(&request.url)?;
        let mut req_builder = self.client.request(request.method.clone(), url);

        for header in &request.headers {
            req_builder = req_builder.header(&header.name, &header.value);
        }

        // The cookie store renders as a single Cookie header
        if let Some(cookie) = cookie_header(&request.cookies) {
            req_builder = req_builder.header("Cookie", cookie);
        }

        req_builder = req_builder.timeout(request.timeout);

        match request.body {
            None => {}
            Some(SendableBody::Bytes(bytes)) => {
                req_builder = req_builder.body(bytes);
            }
            Some(SendableBody::Stream(stream)) => {
                // Convert AsyncRead stream to reqwest Body
                let stream = tokio_util::io::ReaderStream::new(stream);
                req_builder = req_builder.body(reqwest::Body::wrap_stream(stream));
            }
        }

        Ok(req_builder.build()?)
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: SendableRequest) -> Result<HttpResponse> {
        let timeout = request.timeout;
        let req = self.build_request(request)?;

        // Map timeouts to our own error, so they look nicer
        let response = self.client.execute(req).await.map_err(|e| {
            if e.is_timeout() { Error::RequestTimeout(timeout) } else { Error::Client(e) }
        })?;

        let status = response.status().as_u16();
        let status_reason = response.status().canonical_reason().map(|s| s.to_string());
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response.bytes().await.map_err(Error::Client)?.to_vec();

        Ok(HttpResponse { status, status_reason, headers, url, body })
    }
}
