use crate::error::FactsError;
use crate::model::FactMapping;
use regex::Regex;

/// Pattern over fact names that must never be collected or transmitted.
///
/// Matching is an unanchored search: a name is excluded when the pattern
/// matches anywhere in it. Use `^`/`$` to anchor.
#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    regex: Regex,
}

impl ExclusionPattern {
    /// Compile an exclusion pattern
    ///
    /// # Errors
    /// Returns `FactsError::InvalidExclusionPattern` if the pattern is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self, FactsError> {
        let regex = Regex::new(pattern).map_err(|source| FactsError::InvalidExclusionPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Drop every excluded fact from the mapping
    pub fn apply(&self, facts: &mut FactMapping) {
        facts.retain(|name| !self.is_excluded(name));
    }
}

/// Apply an optional pattern; `None` keeps everything.
pub fn filter(facts: &mut FactMapping, exclude: Option<&ExclusionPattern>) {
    if let Some(pattern) = exclude {
        pattern.apply(facts);
    }
}
