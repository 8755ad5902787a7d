//! reqwest-backed transport

use super::{Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;
use crate::request::HttpMethod;
use async_trait::async_trait;
use fetchgate_foundation::{DomainConfig, Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use tracing::trace;

/// HTTP transport bound to one [`DomainConfig`]
///
/// reqwest has no separate send timeout, so the send and receive budgets are
/// summed into one timeout for the exchange after connecting.
pub struct HttpTransport {
    client: Client,
    domain: DomainConfig,
}

impl HttpTransport {
    pub fn new(domain: DomainConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(domain.connect_timeout())
            .timeout(domain.send_timeout() + domain.receive_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, domain })
    }

    pub fn domain(&self) -> &DomainConfig {
        &self.domain
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
        let url = self.domain.url_for(&request.path);
        trace!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .query(&request.query);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse {
            status,
            headers,
            body: decode_body(&bytes),
        })
    }
}

/// JSON when it parses, the text otherwise, `null` for an empty body
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        if err.is_connect() {
            TransportError::ConnectTimeout
        } else {
            TransportError::ReceiveTimeout
        }
    } else if err.is_connect() {
        if mentions_tls(&err) {
            TransportError::Tls(err.to_string())
        } else {
            TransportError::Connect(err.to_string())
        }
    } else if err.is_request() || err.is_body() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn mentions_tls(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        source = cause.source();
    }
    false
}
