use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::error::{Result, StreamError};

/// How a transport failure relates to the retry policy: failures are
/// classified by phase (before vs. after the body started) and by
/// whether re-polling is likely to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request never produced a response body.
    Connect,
    /// The chunked body was cut before the server finished writing it.
    IncompleteBody,
    /// Non-success HTTP status.
    Status,
    /// Anything else (DNS, TLS, decode failures, ...).
    Other,
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

/// Type alias for the chunked response body yielded by a transport
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, TransportError>> + Send>>;

/// Type alias for the future returned by fetch
pub type FetchFuture =
    Pin<Box<dyn Future<Output = std::result::Result<ByteStream, TransportError>> + Send>>;

/// Issues one HTTP request and yields the response body as it arrives.
///
/// The poll loop re-invokes `fetch` whenever a body ends without a
/// terminal event, so implementations must tolerate being called many
/// times for the same URL.
pub trait Transport: Send + Sync {
    /// Issue the request and stream the body chunks.
    fn fetch(&self, url: &str) -> FetchFuture;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

/// Production transport over reqwest's chunked response streaming.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// No overall request timeout: the server may legitimately hold
    /// the response open for minutes while thinking. Stall handling is
    /// the poll loop's job.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                StreamError::InternalError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> FetchFuture {
        let client = self.client.clone();
        let url = url.to_string();

        Box::pin(async move {
            let response = client
                .get(&url)
                .header("Accept", "application/json, text/plain, */*")
                .header("Cache-Control", "no-cache")
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            info!(%status, "Stream endpoint responded");

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(TransportError::new(
                    TransportErrorKind::Status,
                    format!("HTTP {}: {}", status, body),
                ));
            }

            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(classify_reqwest_error));
            Ok(Box::pin(stream) as ByteStream)
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    let kind = if e.is_connect() {
        TransportErrorKind::Connect
    } else if e.is_body() || e.is_decode() {
        // reqwest surfaces a cut chunked body as a body/decode error
        TransportErrorKind::IncompleteBody
    } else if e.is_status() {
        TransportErrorKind::Status
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, e.to_string())
}
