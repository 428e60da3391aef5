//! HTTP transport seam for the downloader.

use std::io::Read;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_ENCODING;
use tracing::debug;

use super::types::TransferError;

/// An open response stream.
pub struct Response {
  /// Value of the `Content-Encoding` header, if any.
  pub content_encoding: Option<String>,
  pub body: Box<dyn Read>,
}

impl Response {
  pub fn new(body: impl Read + 'static) -> Self {
    Self {
      content_encoding: None,
      body: Box::new(body),
    }
  }

  pub fn with_encoding(mut self, encoding: &str) -> Self {
    self.content_encoding = Some(encoding.to_string());
    self
  }
}

/// Opens streaming GET requests.
pub trait Transport {
  fn get(&self, url: &str) -> Result<Response, TransferError>;
}

/// Blocking `reqwest` transport.
///
/// The client has no overall timeout since toolchain sources are large, and
/// never decodes bodies itself; the downloader decides what to decompress.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self, TransferError> {
    let client = Client::builder()
      .user_agent(concat!("toolchain-bootstrap/", env!("CARGO_PKG_VERSION")))
      .timeout(None)
      .build()?;
    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  fn get(&self, url: &str) -> Result<Response, TransferError> {
    let response = self.client.get(url).send()?;
    let status = response.status();
    debug!(url, status = status.as_u16(), "response received");

    if !status.is_success() {
      return Err(TransferError::Status(status.as_u16()));
    }

    let content_encoding = response
      .headers()
      .get(CONTENT_ENCODING)
      .and_then(|value| value.to_str().ok())
      .map(|value| value.trim().to_ascii_lowercase());

    Ok(Response {
      content_encoding,
      body: Box::new(response),
    })
  }
}
