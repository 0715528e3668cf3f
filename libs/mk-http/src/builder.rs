use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::DefaultHeadersLayer;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};

/// Builder for an [`HttpClient`](crate::HttpClient)
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Set the per-request timeout
    ///
    /// Covers connect, TLS handshake, sending the request and receiving the
    /// response head.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Response bytes kept by [`HttpResponse::body_text`](crate::HttpResponse::body_text)
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Build the client.
    ///
    /// Must run inside a tokio runtime: the request buffer spawns its worker
    /// task here.
    ///
    /// # Errors
    /// Returns an error if the user agent is not a valid header value or the
    /// TLS provider cannot be initialized
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("plain HTTP enabled (TransportSecurity::AllowInsecureHttp)");
        }

        let timeout = self.config.request_timeout;
        let https = build_https_connector(self.config.transport)?;

        // pool_timer is required for pool_idle_timeout to take effect
        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);
        if let Some(idle) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let headers_layer = DefaultHeadersLayer::with_user_agent(&self.config.user_agent)?;

        // Request flow: Buffer -> ErrorMapping -> Timeout -> DefaultHeaders -> hyper
        //
        // send() yields Ok for every HTTP status; Err only for transport, TLS
        // or timeout failures. No retries and no redirects are followed.
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers_layer)
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout))
            .boxed_clone();

        let buffered: crate::client::BufferedService =
            Buffer::new(service, self.config.buffer_capacity.max(1));

        Ok(crate::HttpClient {
            service: buffered,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}

/// Use a globally installed provider when present, else aws-lc-rs without
/// installing it.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Mozilla roots; ALPN advertises both h2 and http/1.1.
fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => builder.https_or_http().enable_all_versions().build(),
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let builder = HttpClientBuilder::new()
            .timeout(Duration::from_secs(3))
            .user_agent("mk-agent/1.0")
            .max_body_size(1024)
            .transport(TransportSecurity::AllowInsecureHttp);

        assert_eq!(builder.config.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.user_agent, "mk-agent/1.0");
        assert_eq!(builder.config.max_body_size, 1024);
        assert_eq!(builder.config.transport, TransportSecurity::AllowInsecureHttp);
    }

    #[tokio::test]
    async fn test_build_default() {
        let client = HttpClientBuilder::new().build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_user_agent() {
        let result = HttpClientBuilder::new().user_agent("bad\r\nagent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_build_tls_only_and_insecure() {
        assert!(HttpClientBuilder::new().transport(TransportSecurity::TlsOnly).build().is_ok());
        assert!(
            HttpClientBuilder::new()
                .transport(TransportSecurity::AllowInsecureHttp)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_map_tower_error_timeout() {
        let err: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let mapped = map_tower_error(err, Duration::from_secs(7));
        assert!(matches!(mapped, HttpError::Timeout(d) if d == Duration::from_secs(7)));
    }

    #[test]
    fn test_map_tower_error_keeps_http_error() {
        let err: tower::BoxError = Box::new(HttpError::Overloaded);
        assert!(matches!(
            map_tower_error(err, Duration::from_secs(1)),
            HttpError::Overloaded
        ));
    }
}
