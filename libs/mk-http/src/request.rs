use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::Request;
use http::header::CONTENT_TYPE;
use http_body_util::Full;
use tower::Service;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// POST builder returned by [`HttpClient::post`](crate::HttpClient::post)
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    url: String,
    form: Option<Bytes>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            url,
            form: None,
            transport_security,
        }
    }

    /// Form URL-encoded body
    ///
    /// # Errors
    /// Returns `HttpError::FormEncode` if the fields cannot be encoded.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        let encoded = serde_urlencoded::to_string(fields)?;
        self.form = Some(Bytes::from(encoded));
        Ok(self)
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;

        if uri.authority().is_none() {
            return Err(invalid(
                InvalidUriKind::MissingAuthority,
                "missing host/authority".to_owned(),
            ));
        }

        match (uri.scheme_str(), self.transport_security) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(uri),
            (Some("http"), TransportSecurity::TlsOnly) => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
            (Some(scheme), _) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            (None, _) => Err(invalid(InvalidUriKind::MissingScheme, "missing scheme".to_owned())),
        }
    }

    /// Send the request.
    ///
    /// Every HTTP status comes back as `Ok`; see [`HttpResponse`] for readers.
    ///
    /// # Errors
    /// Returns `HttpError` for an invalid URL, a disallowed scheme,
    /// transport or TLS failure, timeout, or a full request queue.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        let uri = self.validate_url()?;
        let mut builder = Request::builder().method(http::Method::POST).uri(uri);

        let body = match self.form {
            Some(encoded) => {
                builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                encoded
            }
            None => Bytes::new(),
        };

        let request = builder.body(Full::new(body))?;

        try_acquire_buffer_slot(&mut self.service).await?;
        let inner = self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
