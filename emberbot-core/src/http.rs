//! HTTP client abstraction for webhook delivery.
//!
//! The dispatcher talks to this trait instead of a concrete client so tests
//! can capture outbound requests without touching the network. The default
//! implementation wraps reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use emberbot_common::error::Error;

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a single POST with a JSON content type and returns the response
    /// status code. Transport-level failures (DNS, connect, timeout) come
    /// back as [`Error::WebhookUnreachable`].
    async fn post_json(
        &self,
        url: &Url,
        body: String,
        timeout: Option<Duration>,
    ) -> Result<u16, Error>;
}

#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &Url,
        body: String,
        timeout: Option<Duration>,
    ) -> Result<u16, Error> {
        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::WebhookUnreachable(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}
