use crate::changelog::RanChangeSet;
use crate::command::CommandStep;
use crate::filter::{ChangeSetFilter, UpToTagChangeSetFilter};
use crate::mdc::{AuditMetadata, MdcKey};
use crate::{ChangeguardError, Result};

/// Apply pending changesets up to and including the one that establishes a tag
///
/// A tag that is never found bounds nothing: every pending changeset is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateToTagCommandStep {
    tag: String,
}

impl UpdateToTagCommandStep {
    /// # Errors
    ///
    /// Returns a configuration error if the tag is blank.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(missing_tag());
        }
        Ok(Self { tag: tag.to_string() })
    }

    /// Build from a raw argument value
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the tag is missing or blank.
    pub fn from_arguments(tag: Option<&str>) -> Result<Self> {
        tag.ok_or_else(missing_tag).and_then(Self::new)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

fn missing_tag() -> ChangeguardError {
    ChangeguardError::Configuration("The tag to update to is required".to_string())
}

impl CommandStep for UpdateToTagCommandStep {
    fn command_name(&self) -> &'static str {
        "updateToTag"
    }

    fn operation(&self) -> &'static str {
        "update-to-tag"
    }

    fn bound_filter(&self, ran_change_sets: &[RanChangeSet]) -> Option<ChangeSetFilter> {
        Some(UpToTagChangeSetFilter::new(self.tag.clone(), ran_change_sets).into())
    }

    fn target_tag(&self) -> Option<&str> {
        Some(&self.tag)
    }

    fn custom_mdc(&self, metadata: &mut AuditMetadata) {
        metadata.add(MdcKey::UPDATE_TO_TAG, self.tag.clone());
    }
}
