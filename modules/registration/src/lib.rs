#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Node registration against a provisioning server.
//!
//! [`RegistrationManager`] collects the node's facts, decides whether the
//! server needs to hear about them, posts them once and records the accepted
//! snapshot as the new baseline. Fact collection, baseline storage and the
//! network exchange are injected as trait objects.

pub mod config;
pub mod domain;
pub mod transport;

pub use config::{ConfigError, DEFAULT_REGISTRATION_URI, RegistrationConfig};
pub use domain::baseline::{
    BaselineError, BaselineStore, DEFAULT_BASELINE_PATH, FileBaselineStore, InMemoryBaselineStore,
};
pub use domain::error::RegistrationError;
pub use domain::identity::{IdentityError, NodeIdentity};
pub use domain::manager::RegistrationManager;
pub use domain::outcome::{Registration, SUCCESS_STATUS_RANGE, StatusClass, classify};
pub use domain::payload::{PAYLOAD_FORM_FIELD, RegistrationPayload};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
