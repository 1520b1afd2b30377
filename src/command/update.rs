use crate::changelog::RanChangeSet;
use crate::command::CommandStep;
use crate::filter::ChangeSetFilter;

/// Apply every pending changeset
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateCommandStep;

impl CommandStep for UpdateCommandStep {
    fn command_name(&self) -> &'static str {
        "update"
    }

    fn operation(&self) -> &'static str {
        "update"
    }

    fn bound_filter(&self, _ran_change_sets: &[RanChangeSet]) -> Option<ChangeSetFilter> {
        None
    }
}
