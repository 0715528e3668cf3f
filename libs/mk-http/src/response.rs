use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{Response, StatusCode};
use http_body_util::BodyExt;

/// Type-erased response body
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// HTTP response; the body is read independently of the status.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Read the body as UTF-8 text whatever the status.
    ///
    /// At most `max_body_size` bytes are kept; the remainder is discarded
    /// unread, so an oversized body never hides the status. Invalid UTF-8
    /// is replaced rather than rejected.
    ///
    /// # Errors
    /// Returns `HttpError::Transport` if the connection fails mid-body.
    pub async fn body_text(self) -> Result<String, HttpError> {
        let limit = self.max_body_size;
        let (bytes, truncated) = read_body_truncated(self.inner, limit).await?;
        if truncated {
            tracing::warn!(limit, "response body exceeded size limit; truncated");
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Collect up to `limit` bytes; `true` when more data followed.
async fn read_body_truncated(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<(Bytes, bool), HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        let Some(chunk) = frame.data_ref() else {
            continue;
        };

        let room = limit - collected.len();
        if chunk.len() > room {
            collected.extend_from_slice(&chunk[..room]);
            return Ok((collected.freeze(), true));
        }
        collected.extend_from_slice(chunk);
    }

    Ok((collected.freeze(), false))
}
