use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use revalidate_core::InvalidationTag;
use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;
use crate::error::{ListenerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub status: u16,
    /// What the cache layer reported back, when its body could be read.
    pub revalidated: Option<bool>,
}

#[async_trait]
pub trait InvalidationDispatcher: Send + Sync {
    async fn dispatch(&self, tag: &InvalidationTag) -> Result<DispatchReceipt>;
}

#[async_trait]
impl<T: InvalidationDispatcher + ?Sized> InvalidationDispatcher for Arc<T> {
    async fn dispatch(&self, tag: &InvalidationTag) -> Result<DispatchReceipt> {
        (**self).dispatch(tag).await
    }
}

#[derive(Debug, Serialize)]
struct InvalidationRequest<'a> {
    tag: &'a InvalidationTag,
}

#[derive(Debug, Deserialize)]
struct InvalidationResponse {
    revalidated: bool,
}

/// POSTs `{"tag": ...}` to the cache layer's invalidation endpoint.
#[derive(Debug)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ListenerError::Config(format!("failed to build http client: {}", e)))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: reqwest::Client, config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client,
            url: config.url()?,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl InvalidationDispatcher for HttpDispatcher {
    async fn dispatch(&self, tag: &InvalidationTag) -> Result<DispatchReceipt> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&InvalidationRequest { tag })
            .send()
            .await
            .map_err(|e| ListenerError::DispatchTransport {
                url: self.url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListenerError::DispatchStatus {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let revalidated = match response.bytes().await {
            Ok(body) => serde_json::from_slice::<InvalidationResponse>(&body)
                .map(|r| r.revalidated)
                .ok(),
            Err(e) => {
                tracing::debug!(error = %e, "Could not read invalidation response body");
                None
            }
        };

        Ok(DispatchReceipt {
            status: status.as_u16(),
            revalidated,
        })
    }
}
