use mk_facts::{FactMapping, HOSTNAME_FACT};
use serde::Serialize;
use std::fmt;

/// Why a node identity could not be derived
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("hostname fact is missing")]
    MissingHostname,

    #[error("hostname fact is not a string")]
    HostnameNotText,

    #[error("hostname '{hostname}' has no characters left after dropping a {prefix_len}-character prefix")]
    HostnameTooShort { hostname: String, prefix_len: usize },
}

/// Stable node identifier sent as `@uuid`.
///
/// Microkernel hostnames are a fixed short prefix followed by a per-node
/// token; the identity is that token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    /// Derive the identity from the `hostname` fact by dropping the first
    /// `prefix_len` characters.
    ///
    /// # Errors
    /// Returns `IdentityError` if the hostname is absent, not textual, or
    /// nothing remains once the prefix is dropped.
    pub fn derive(facts: &FactMapping, prefix_len: usize) -> Result<Self, IdentityError> {
        let hostname = facts
            .get(HOSTNAME_FACT)
            .ok_or(IdentityError::MissingHostname)?
            .as_str()
            .ok_or(IdentityError::HostnameNotText)?;

        // Character boundaries, not bytes
        let remainder = match hostname.char_indices().nth(prefix_len) {
            Some((offset, _)) => &hostname[offset..],
            None => "",
        };

        if remainder.is_empty() {
            return Err(IdentityError::HostnameTooShort {
                hostname: hostname.to_owned(),
                prefix_len,
            });
        }

        Ok(Self(remainder.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
