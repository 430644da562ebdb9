//! Authenticated JSON requests against the Neon control plane.

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::NeonConfig;
use crate::error::{NeonError, Result};

#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    api_key: String,
}

impl Transport {
    pub fn new(config: &NeonConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| NeonError::Transport {
                operation: "Transport::new",
                source,
            })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
        })
    }

    /// Start a request that accepts JSON and carries the bearer token.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.api_key)
    }

    /// Execute a request. `operation` names the caller in any error.
    pub async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| NeonError::Transport { operation, source })?;

        log::debug!(
            "{}: {} -> {}",
            operation,
            response.url(),
            response.status()
        );
        Ok(response)
    }
}

/// Pass the response through if its status is one of `accepted`.
pub async fn expect_status(
    operation: &'static str,
    response: Response,
    accepted: &[StatusCode],
) -> Result<Response> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|err| format!("<unreadable body: {err}>"));

    Err(NeonError::UnexpectedStatus {
        operation,
        status: status.as_u16(),
        url,
        body,
    })
}

/// Decode a response body into `T`.
pub async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|source| NeonError::Transport { operation, source })?;

    serde_json::from_str(&body).map_err(|source| NeonError::Decode {
        operation,
        type_name: std::any::type_name::<T>(),
        url,
        body,
        source,
    })
}
