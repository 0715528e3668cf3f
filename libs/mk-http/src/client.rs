use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use tower::Service;
use tower::buffer::Buffer;

pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// HTTP client over a buffered tower stack.
///
/// `Clone + Send + Sync`; clones share the connection pool and request queue,
/// so store it directly rather than behind a mutex.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl HttpClient {
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// POST request. `url` must be absolute.
    pub fn post(&self, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            url.to_owned(),
            self.transport_security,
        )
    }
}

/// An inner `HttpError` passes through; anything else means the buffer
/// worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(err) => {
            tracing::error!(error = %err, "buffer worker closed unexpectedly");
            HttpError::ServiceClosed
        }
    }
}

/// Reserve a queue slot without waiting; a full queue is `Overloaded`.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let polled = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match polled {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::HttpClientConfig;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn test_client() -> HttpClient {
        HttpClientBuilder::with_config(HttpClientConfig::for_testing())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_form_sets_content_type_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/register")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("json_hash=%7B%22a%22%3A1%7D");
            then.status(200).body("ok");
        });

        let url = server.url("/api/register");
        let resp = test_client()
            .post(&url)
            .form(&[("json_hash", r#"{"a":1}"#)])
            .unwrap()
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(resp.body_text().await.unwrap(), "ok");
        mock.assert();
    }

    #[tokio::test]
    async fn test_non_2xx_is_not_an_error_from_send() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/register");
            then.status(422).body("bad facts");
        });

        let resp = test_client()
            .post(&server.url("/api/register"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 422);
        assert_eq!(resp.body_text().await.unwrap(), "bad facts");
    }

    #[tokio::test]
    async fn test_oversized_body_keeps_status() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/register");
            then.status(500).body("internal error");
        });

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing())
            .max_body_size(4)
            .build()
            .unwrap();
        let resp = client
            .post(&server.url("/api/register"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(resp.body_text().await.unwrap(), "inte");
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/ua").header("user-agent", "mk-agent/test");
            then.status(204);
        });

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing())
            .user_agent("mk-agent/test")
            .build()
            .unwrap();
        let resp = client.post(&server.url("/ua")).send().await.unwrap();

        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
        mock.assert();
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let client = HttpClientBuilder::with_config(HttpClientConfig::for_testing())
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client.post(&server.url("/slow")).send().await.unwrap_err();

        assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is closed on test machines
        let err = test_client()
            .post("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
    }

    #[tokio::test]
    async fn test_http_rejected_when_tls_only() {
        let client = HttpClient::builder().build().unwrap();
        let err = client.post("http://localhost/").send().await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { ref scheme, .. } if scheme == "http"));
    }

    #[tokio::test]
    async fn test_relative_url_rejected() {
        let err = test_client().post("/relative").send().await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: crate::InvalidUriKind::MissingAuthority,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_client_is_clone_and_shared() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/shared");
            then.status(200);
        });

        let client = test_client();
        let clone = client.clone();
        let url = server.url("/shared");

        let (a, b) = tokio::join!(client.post(&url).send(), clone.post(&url).send());
        assert!(a.unwrap().status().is_success());
        assert!(b.unwrap().status().is_success());
        assert_eq!(mock.calls(), 2);
    }
}
