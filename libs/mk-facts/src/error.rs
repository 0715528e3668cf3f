/// Errors for node fact collection
#[derive(Debug, thiserror::Error)]
pub enum FactsError {
    #[error("System fact collection failed: {0}")]
    SystemCollectionFailed(String),

    #[error("Hardware fact collection failed: {0}")]
    HardwareCollectionFailed(String),

    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidExclusionPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
