//! Metrics and tracing helpers
//!
//! Both are optional: `metrics` exports Prometheus counters through
//! OpenTelemetry, `tracing` opens spans carrying the audit metadata of a run.

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{ChangeguardMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use crate::filter::FilterResult;
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::{global, KeyValue};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use std::time::Duration;

    pub static METRICS: Lazy<ChangeguardMetrics> = Lazy::new(ChangeguardMetrics::init);

    pub struct ChangeguardMetrics {
        pub registry: prometheus::Registry,
        _provider: Option<SdkMeterProvider>,
        pub command_runs: Counter<u64>,
        pub change_sets_applied: Counter<u64>,
        pub change_sets_skipped: Counter<u64>,
        pub change_set_duration: Histogram<f64>,
    }

    impl ChangeguardMetrics {
        pub fn init() -> Self {
            let registry = prometheus::Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => Some(SdkMeterProvider::builder().with_reader(exporter).build()),
                Err(e) => {
                    log::warn!("Failed to build prometheus exporter, metrics will not be exported: {e}");
                    None
                }
            };
            let meter = match &provider {
                Some(provider) => provider.meter("changeguard"),
                None => global::meter("changeguard"),
            };

            let command_runs = meter
                .u64_counter("changeguard_command_runs_total")
                .with_description("Command runs by operation and outcome")
                .build();

            let change_sets_applied = meter
                .u64_counter("changeguard_changesets_applied_total")
                .with_description("Changesets applied to the database")
                .build();

            let change_sets_skipped = meter
                .u64_counter("changeguard_changesets_skipped_total")
                .with_description("Changesets rejected by the filter chain, by first rejecting filter")
                .build();

            let change_set_duration = meter
                .f64_histogram("changeguard_changeset_duration_seconds")
                .with_description("Time spent executing a changeset")
                .build();

            Self {
                registry,
                _provider: provider,
                command_runs,
                change_sets_applied,
                change_sets_skipped,
                change_set_duration,
            }
        }

        pub fn record_command(&self, operation: &'static str, outcome: &'static str) {
            self.command_runs.add(
                1,
                &[
                    KeyValue::new("operation", operation),
                    KeyValue::new("outcome", outcome),
                ],
            );
        }

        pub fn record_applied(&self, elapsed: Duration) {
            self.change_sets_applied.add(1, &[]);
            self.change_set_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_skipped(&self, results: &[FilterResult]) {
            let filter = results
                .iter()
                .find(|r| !r.is_accepted())
                .map(FilterResult::mdc_name)
                .unwrap_or("unknown");
            self.change_sets_skipped
                .add(1, &[KeyValue::new("filter", filter)]);
        }

        /// Render the registry in the Prometheus text format
        pub fn gather(&self) -> String {
            let encoder = prometheus::TextEncoder::new();
            encoder
                .encode_to_string(&self.registry.gather())
                .unwrap_or_default()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use crate::changelog::ChangeSetId;
    use crate::filter::FilterResult;
    use crate::mdc::{AuditMetadata, MdcKey};
    use tracing::{field, Span};

    const MAX_SQL_IN_SPAN: usize = 200;

    /// Span for a whole command run, carrying its audit metadata
    pub fn command_span(mdc: &AuditMetadata) -> Span {
        let span = tracing::info_span!(
            "changeguard.command",
            command_name = field::Empty,
            operation = field::Empty,
            deployment_id = field::Empty,
            database = field::Empty,
            update_to_tag = field::Empty,
            update_count = field::Empty,
        );
        for (key, value) in mdc.iter() {
            if key == MdcKey::COMMAND_NAME {
                span.record("command_name", value);
            } else if key == MdcKey::OPERATION {
                span.record("operation", value);
            } else if key == MdcKey::DEPLOYMENT_ID {
                span.record("deployment_id", value);
            } else if key == MdcKey::DATABASE {
                span.record("database", value);
            } else if key == MdcKey::UPDATE_TO_TAG {
                span.record("update_to_tag", value);
            } else if key == MdcKey::UPDATE_COUNT {
                span.record("update_count", value);
            }
        }
        span
    }

    /// Span for the evaluation and execution of one changeset
    ///
    /// Field names are the changeset's MDC keys; the outcome is filled in by
    /// [`record_decision`].
    pub fn change_set_span(change_set: &ChangeSetId) -> Span {
        let span = tracing::debug_span!(
            "changeguard.changeset",
            changesetId = field::Empty,
            changesetAuthor = field::Empty,
            changesetFilepath = field::Empty,
            changesetOutcome = field::Empty,
        );
        span.record(MdcKey::CHANGESET_ID, change_set.id.as_str());
        span.record(MdcKey::CHANGESET_AUTHOR, change_set.author.as_str());
        span.record(MdcKey::CHANGESET_PATH, change_set.path.as_str());
        span
    }

    /// Record the chain's verdict on the changeset span, plus an event keyed by
    /// the rejecting filters' MDC names
    pub fn record_decision(span: &Span, accepted: bool, results: &[FilterResult]) {
        span.record(MdcKey::CHANGESET_OUTCOME, if accepted { "accepted" } else { "skipped" });
        let rejected_by: Vec<&str> = results
            .iter()
            .filter(|r| !r.is_accepted())
            .map(FilterResult::mdc_name)
            .collect();
        tracing::debug!(accepted, rejected_by = %rejected_by.join(","), "changeset decision");
    }

    /// Span around a single SQL statement
    pub fn execute_statement_span(sql: &str) -> Span {
        let shown = match sql.char_indices().nth(MAX_SQL_IN_SPAN) {
            Some((idx, _)) => &sql[..idx],
            None => sql,
        };
        tracing::debug_span!("changeguard.execute", sql = %shown)
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::METRICS;
    use std::time::Duration;

    #[test]
    fn test_recorded_counters_are_exported() {
        METRICS.record_command("update", "success");
        METRICS.record_applied(Duration::from_millis(12));
        METRICS.record_skipped(&[]);

        let text = METRICS.gather();
        assert!(text.contains("changeguard_command_runs_total"));
        assert!(text.contains("changeguard_changesets_applied_total"));
    }
}
