//! HTTP transport backed by `reqwest`.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use formwiz::{
    error::TransportError,
    submit::{Transport, TransportResponse},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport sending `headers` with every request.
    pub fn new(headers: &HashMap<String, String>) -> Result<Self> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name `{name}`"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header `{name}`"))?;
            map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("formwiz/", env!("CARGO_PKG_VERSION")))
            .default_headers(map)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client })
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Transport for HttpTransport {
    /// Fetches a JSON document. Anything that is not an `http(s)` URL is
    /// read as a local file path.
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        if !is_remote(url) {
            let path = url.strip_prefix("file://").unwrap_or(url);
            let content = tokio::fs::read_to_string(path).await?;
            let data = serde_json::from_str::<Value>(&content)
                .map_err(|e| TransportError::Decode(format!("{path}: {e}")))?;
            return Ok(TransportResponse {
                status: 200,
                data: Some(data),
            });
        }

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let data = if status.is_success() {
            let data = response
                .json::<Value>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            Some(data)
        } else {
            None
        };
        Ok(TransportResponse {
            status: status.as_u16(),
            data,
        })
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        // Endpoints may answer with an empty or non-JSON body.
        let data = response.json::<Value>().await.ok();
        Ok(TransportResponse { status, data })
    }
}
