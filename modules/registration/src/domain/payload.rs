use crate::domain::identity::NodeIdentity;
use mk_facts::FactMapping;
use serde::Serialize;

/// Name of the single form field carrying the JSON document
pub const PAYLOAD_FORM_FIELD: &str = "json_hash";

/// Document posted to the registration endpoint.
///
/// Built fresh for every attempt and never stored; on success only
/// `attributes` become the new baseline.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationPayload<'a> {
    #[serde(rename = "@uuid")]
    pub identity: &'a NodeIdentity,

    #[serde(rename = "@attributes_hash")]
    pub attributes: &'a FactMapping,

    #[serde(rename = "@last_state")]
    pub last_state: &'a str,
}

impl<'a> RegistrationPayload<'a> {
    #[must_use]
    pub fn new(identity: &'a NodeIdentity, attributes: &'a FactMapping, last_state: &'a str) -> Self {
        Self {
            identity,
            attributes,
            last_state,
        }
    }

    /// JSON text sent as the value of [`PAYLOAD_FORM_FIELD`]
    ///
    /// # Errors
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
