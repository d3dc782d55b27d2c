//! Metrics and tracing helpers.
//!
//! With the `metrics` feature, [`METRICS`] records statement and relation
//! commit activity through OpenTelemetry with a Prometheus exporter. With the
//! `tracing` feature, [`tracing_helpers`] opens the spans used around SQL
//! execution, transaction boundaries and relation commits.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{LifeguardMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        metrics::{Counter, Histogram, MeterProvider},
        KeyValue,
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<LifeguardMetrics> = Lazy::new(LifeguardMetrics::init);

    pub struct LifeguardMetrics {
        /// Registry the Prometheus exporter writes into
        pub registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub relation_commits_total: Counter<u64>,
        pub relation_commit_duration: Histogram<f64>,
        pub staged_mutations_total: Counter<u64>,
    }

    impl LifeguardMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("lifeguard_cluster");

            let queries_total = meter
                .u64_counter("lifeguard_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("lifeguard_query_errors_total")
                .with_description("Queries that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("lifeguard_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("lifeguard_connection_wait_seconds")
                .with_description("Time spent establishing connections")
                .build();

            let relation_commits_total = meter
                .u64_counter("lifeguard_cluster_relation_commits_total")
                .with_description("Staged relations reconciled against the database")
                .build();

            let relation_commit_duration = meter
                .f64_histogram("lifeguard_cluster_relation_commit_seconds")
                .with_description("Duration of staged relation commits")
                .build();

            let staged_mutations_total = meter
                .u64_counter("lifeguard_cluster_staged_mutations_total")
                .with_description("In-memory relation mutations (add, remove, create, clear)")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                relation_commits_total,
                relation_commit_duration,
                staged_mutations_total,
            }
        }

        /// Current metrics in the Prometheus text exposition format
        pub fn render(&self) -> Result<String, prometheus::Error> {
            TextEncoder::new().encode_to_string(&self.registry.gather())
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_relation_commit(&self, relation: &'static str, elapsed: Duration) {
            let attributes = [KeyValue::new("relation", relation)];
            self.relation_commits_total.add(1, &attributes);
            self.relation_commit_duration
                .record(elapsed.as_secs_f64(), &attributes);
        }

        pub fn record_staged_mutation(&self, relation: &'static str, operation: &'static str) {
            self.staged_mutations_total.add(
                1,
                &[
                    KeyValue::new("relation", relation),
                    KeyValue::new("operation", operation),
                ],
            );
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn execute_query_span(query: &str) -> Span {
        tracing::debug_span!("lifeguard.execute_query", db.statement = %query)
    }

    pub fn acquire_connection_span() -> Span {
        tracing::debug_span!("lifeguard.acquire_connection")
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("lifeguard.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("lifeguard.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("lifeguard.rollback_transaction")
    }

    pub fn commit_relation_span(relation: &'static str, flavor: &'static str) -> Span {
        tracing::info_span!("lifeguard.cluster.commit", relation, flavor)
    }
}
