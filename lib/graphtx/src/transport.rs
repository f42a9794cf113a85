//! The blocking HTTP capability the client is built on.

use crate::config::ClientConfig;
use crate::error::ConfigError;
use http::{Request, Response};
use std::error::Error;
use std::sync::Arc;
use tracing::trace;

/// Sends one HTTP request and waits for the fully buffered response.
///
/// Any response, whatever its status, is a success at this level. Only failures to obtain a
/// response are reported as [`TransportError`].
pub trait HttpTransport {
    /// Executes the request.
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        (**self).send(request)
    }
}

/// A failure to obtain a response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established (DNS resolution, refused connection, TLS).
    #[error("Could not connect to {url}: {source}")]
    Connect {
        /// The requested URL.
        url: String,
        /// The underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
    /// The request did not complete in time.
    #[error("Request to {url} timed out: {source}")]
    Timeout {
        /// The requested URL.
        url: String,
        /// The underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
    /// Any other failure while sending the request or reading the response.
    #[error("Request to {url} failed: {source}")]
    Other {
        /// The requested URL.
        url: String,
        /// The underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
}

impl TransportError {
    /// Whether the store could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }

    fn from_reqwest(url: String, error: reqwest::Error) -> Self {
        if error.is_connect() {
            Self::Connect {
                url,
                source: Box::new(error),
            }
        } else if error.is_timeout() {
            Self::Timeout {
                url,
                source: Box::new(error),
            }
        } else {
            Self::Other {
                url,
                source: Box::new(error),
            }
        }
    }
}

/// [`HttpTransport`] implemented on top of the blocking [`reqwest`] client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    credentials: Option<(String, String)>,
}

impl ReqwestTransport {
    /// Creates a transport with the timeouts, user agent and credentials of the configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent());
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(Box::new(e)))?;
        Ok(Self {
            client,
            credentials: config
                .credentials()
                .map(|c| (c.username().to_owned(), c.password().to_owned())),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        let url = request.uri().to_string();
        trace!(method = %request.method(), %url, "Sending request");
        let (parts, body) = request.into_parts();
        let mut builder = self
            .client
            .request(parts.method, url.as_str())
            .headers(parts.headers)
            .body(body);
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }
        let response = builder
            .send()
            .map_err(|e| TransportError::from_reqwest(url.clone(), e))?;

        let mut result = Response::builder().status(response.status());
        if let Some(headers) = result.headers_mut() {
            headers.extend(
                response
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
        }
        let body = response
            .bytes()
            .map_err(|e| TransportError::from_reqwest(url.clone(), e))?;
        result
            .body(body.to_vec())
            .map_err(|e| TransportError::Other {
                url,
                source: Box::new(e),
            })
    }
}
