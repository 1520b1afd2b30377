use crate::changelog::ChangeSet;
use crate::filter::{FilterKind, FilterResult};

/// Accepts the first `limit` changesets it is shown and rejects the rest
///
/// The counter advances on every call, including for changesets that other
/// filters in the chain reject.
#[derive(Debug, Clone)]
pub struct CountChangeSetFilter {
    limit: usize,
    seen: usize,
}

impl CountChangeSetFilter {
    pub fn new(limit: usize) -> Self {
        Self { limit, seen: 0 }
    }

    pub fn accepts(&mut self, _change_set: &ChangeSet) -> FilterResult {
        self.seen += 1;

        if self.seen <= self.limit {
            FilterResult::accept(
                FilterKind::Count,
                format!("One of {} changesets to run", self.limit),
            )
        } else {
            let plurality = if self.limit == 1 { "changeset" } else { "changesets" };
            FilterResult::reject(
                FilterKind::Count,
                format!("Only running {} {}", self.limit, plurality),
            )
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of changesets this filter has been shown so far
    pub fn seen(&self) -> usize {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_sets(n: usize) -> Vec<ChangeSet> {
        (0..n)
            .map(|i| {
                ChangeSet::builder(i.to_string(), "alice", "changelog.toml")
                    .build()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_accepts_exactly_limit_in_order() {
        let mut filter = CountChangeSetFilter::new(3);
        let verdicts: Vec<bool> = change_sets(5)
            .iter()
            .map(|cs| filter.accepts(cs).is_accepted())
            .collect();
        assert_eq!(verdicts, vec![true, true, true, false, false]);
        assert_eq!(filter.seen(), 5);
    }

    #[test]
    fn test_messages_pluralize_on_limit() {
        let css = change_sets(2);

        let mut single = CountChangeSetFilter::new(1);
        assert_eq!(single.accepts(&css[0]).message(), "One of 1 changesets to run");
        assert_eq!(single.accepts(&css[1]).message(), "Only running 1 changeset");

        let mut none = CountChangeSetFilter::new(0);
        assert_eq!(none.accepts(&css[0]).message(), "Only running 0 changesets");
    }
}
