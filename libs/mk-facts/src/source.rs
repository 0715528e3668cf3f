use crate::error::FactsError;
use crate::exclusion::{ExclusionPattern, filter};
use crate::model::FactMapping;

/// Supplier of node facts.
///
/// Every call reflects the current machine state; implementations must not
/// cache results across calls. Facts matching `exclude` are never returned.
pub trait FactSource: Send + Sync {
    /// Collect the current facts
    ///
    /// # Errors
    /// Returns `FactsError` if the underlying subsystem cannot be queried.
    fn collect(&self, exclude: Option<&ExclusionPattern>) -> Result<FactMapping, FactsError>;
}

/// Base facts merged with supplemental facts.
///
/// The exclusion pattern is applied to each source separately, so a name
/// excluded from the base set cannot sneak back in through the supplemental
/// set. Supplemental values win on name collision.
pub struct MergedFactSource {
    base: Box<dyn FactSource>,
    supplemental: Box<dyn FactSource>,
}

impl MergedFactSource {
    #[must_use]
    pub fn new(base: Box<dyn FactSource>, supplemental: Box<dyn FactSource>) -> Self {
        Self { base, supplemental }
    }
}

impl FactSource for MergedFactSource {
    fn collect(&self, exclude: Option<&ExclusionPattern>) -> Result<FactMapping, FactsError> {
        let mut facts = self.base.collect(exclude)?;
        let extra = self.supplemental.collect(exclude)?;
        tracing::debug!(
            base = facts.len(),
            supplemental = extra.len(),
            "Merging supplemental facts"
        );
        facts.merge(extra);
        Ok(facts)
    }
}

/// Fact source returning a fixed mapping (dry runs and tests).
#[derive(Debug, Clone, Default)]
pub struct StaticFactSource {
    facts: FactMapping,
}

impl StaticFactSource {
    #[must_use]
    pub fn new(facts: FactMapping) -> Self {
        Self { facts }
    }
}

impl FactSource for StaticFactSource {
    fn collect(&self, exclude: Option<&ExclusionPattern>) -> Result<FactMapping, FactsError> {
        let mut facts = self.facts.clone();
        filter(&mut facts, exclude);
        Ok(facts)
    }
}
