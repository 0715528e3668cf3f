#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client infrastructure for the microkernel agent
//!
//! This crate provides a hyper-based HTTP client with:
//! - TLS via rustls with Mozilla roots (HTTPS only by default, plain HTTP
//!   on explicit opt-in)
//! - Connection pooling
//! - A per-request timeout (an unbounded hang is never possible)
//! - User-Agent header injection
//! - Form URL-encoded POST bodies
//! - Response bodies read whatever the status, truncated at a size limit
//!
//! The client performs exactly one attempt per request. Retry and backoff
//! policy belongs to the caller.
//!
//! # Example
//!
//! ```ignore
//! use mk_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("mk-agent/0.1")
//!     .build()?;
//!
//! let resp = client
//!     .post("https://provisioner.example.com/api/node/register")
//!     .form(&[("json_hash", "{}")])?
//!     .send()
//!     .await?;
//!
//! // send() returns Ok for every HTTP status; inspect it explicitly
//! let status = resp.status();
//! let body = resp.body_text().await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};

/// Re-export of the status code type returned by [`HttpResponse::status`]
pub use http::StatusCode;
