use crate::domain::identity::NodeIdentity;
use std::ops::RangeInclusive;

/// Statuses that count as an accepted registration
pub const SUCCESS_STATUS_RANGE: RangeInclusive<u16> = 200..=299;

/// Server verdict on a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Rejection,
}

#[must_use]
pub fn classify(status: u16) -> StatusClass {
    if SUCCESS_STATUS_RANGE.contains(&status) {
        StatusClass::Success
    } else {
        StatusClass::Rejection
    }
}

/// A registration the server accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: NodeIdentity,
    pub status: u16,
    /// Response body as sent by the server
    pub body: String,
    /// Number of facts in the accepted snapshot
    pub fact_count: usize,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(199), StatusClass::Rejection);
        assert_eq!(classify(200), StatusClass::Success);
        assert_eq!(classify(204), StatusClass::Success);
        assert_eq!(classify(299), StatusClass::Success);
        assert_eq!(classify(300), StatusClass::Rejection);
        assert_eq!(classify(404), StatusClass::Rejection);
        assert_eq!(classify(500), StatusClass::Rejection);
    }
}
