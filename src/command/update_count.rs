use crate::changelog::RanChangeSet;
use crate::command::CommandStep;
use crate::filter::{ChangeSetFilter, CountChangeSetFilter};
use crate::mdc::{AuditMetadata, MdcKey};
use crate::{ChangeguardError, Result};

/// Apply at most `count` pending changesets
///
/// The count bounds the changesets seen by the chain, so changesets rejected
/// by an earlier filter still use up the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCountCommandStep {
    count: usize,
}

impl UpdateCountCommandStep {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Build from a raw argument value
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the count is missing or not a
    /// non-negative integer.
    pub fn from_arguments(count: Option<&str>) -> Result<Self> {
        let raw = count
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChangeguardError::Configuration("The number of changesets to apply is required".to_string()))?;
        raw.parse()
            .map(Self::new)
            .map_err(|_| ChangeguardError::Configuration(format!("'{raw}' is not a valid changeset count")))
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl CommandStep for UpdateCountCommandStep {
    fn command_name(&self) -> &'static str {
        "updateCount"
    }

    fn operation(&self) -> &'static str {
        "update-count"
    }

    fn bound_filter(&self, _ran_change_sets: &[RanChangeSet]) -> Option<ChangeSetFilter> {
        Some(CountChangeSetFilter::new(self.count).into())
    }

    fn custom_mdc(&self, metadata: &mut AuditMetadata) {
        metadata.add(MdcKey::UPDATE_COUNT, self.count.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("3"), Some(3))]
    #[case(Some(" 0 "), Some(0))]
    #[case(Some("-1"), None)]
    #[case(Some("three"), None)]
    #[case(Some(""), None)]
    #[case(None, None)]
    fn test_from_arguments(#[case] raw: Option<&str>, #[case] expected: Option<usize>) {
        match (UpdateCountCommandStep::from_arguments(raw), expected) {
            (Ok(step), Some(count)) => assert_eq!(step.count(), count),
            (Err(err), None) => assert!(err.is_configuration()),
            (other, _) => panic!("unexpected result {other:?} for {raw:?}"),
        }
    }

    #[test]
    fn test_records_count_in_metadata() {
        let mut metadata = AuditMetadata::new();
        UpdateCountCommandStep::new(2).custom_mdc(&mut metadata);
        assert_eq!(metadata.get(MdcKey::UPDATE_COUNT), Some("2"));
    }
}
