use crate::config::RegistrationConfig;
use async_trait::async_trait;
use mk_http::{HttpClient, HttpError, TransportSecurity};
use std::time::Duration;

/// Status and body returned by the server, whatever the status.
///
/// `body` is cut at the client's body size limit; the status is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a complete response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Sends registration forms to the provisioning server
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `fields` form-encoded to `uri`, once.
    ///
    /// A non-2xx status is a normal response here, not an error.
    ///
    /// # Errors
    /// Returns `TransportError` on connection failure, TLS failure, timeout,
    /// or an invalid URI.
    async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] over [`mk_http::HttpClient`]
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
    timeout: Duration,
}

impl HttpTransport {
    /// Build the HTTP client for `config`.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns `HttpError` if the user agent is invalid or TLS cannot be initialized.
    pub fn new(config: &RegistrationConfig) -> Result<Self, HttpError> {
        let transport = if config.allow_insecure_http {
            TransportSecurity::AllowInsecureHttp
        } else {
            TransportSecurity::TlsOnly
        };

        let client = HttpClient::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .transport(transport)
            .build()?;

        Ok(Self::with_client(client, config.request_timeout))
    }

    #[must_use]
    pub fn with_client(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn exchange(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self.client.post(uri).form(fields)?.send().await?;
        let status = response.status().as_u16();
        let body = response.body_text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        // The client timeout stops at the response head; this one also
        // covers reading the body.
        let response = tokio::time::timeout(self.timeout, self.exchange(uri, fields))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        tracing::debug!(uri, status = response.status, "Registration response received");
        Ok(response)
    }
}
