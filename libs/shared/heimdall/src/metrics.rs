//! Prometheus metric registry backing `GET /metrics` (C10).

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpRouteLabels {
    pub method: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpRequestLabels {
    pub method: String,
    pub endpoint: String,
    pub status: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpErrorLabels {
    pub method: String,
    pub endpoint: String,
    pub error_type: String,
    pub status: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApplicationErrorLabels {
    pub error_type: String,
    pub severity: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DecisionLabels {
    pub decision: String,
    pub reason: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EntryCategoryLabel {
    pub category: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DbOperationStatusLabels {
    pub operation: String,
    pub status: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DbOperationLabel {
    pub operation: String,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// All metric series named in §4.10, registered once at startup and shared
/// behind an `Arc` across handlers and middleware.
pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: Family<HttpRequestLabels, Counter>,
    pub http_request_duration_seconds: Family<HttpRouteLabels, Histogram>,
    pub http_requests_inprogress: Family<HttpRouteLabels, Gauge>,
    pub http_errors_total: Family<HttpErrorLabels, Counter>,
    pub application_errors_total: Family<ApplicationErrorLabels, Counter>,
    pub blacklist_decisions_total: Family<DecisionLabels, Counter>,
    pub blacklist_whitelist_hits_total: Counter,
    pub blacklist_entries_total: Family<EntryCategoryLabel, Gauge>,
    pub blacklist_db_operations_total: Family<DbOperationStatusLabels, Counter>,
    pub blacklist_db_operation_duration_seconds: Family<DbOperationLabel, Histogram>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<HttpRequestLabels, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total HTTP requests handled",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<HttpRouteLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 12))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency",
            http_request_duration_seconds.clone(),
        );

        let http_requests_inprogress = Family::<HttpRouteLabels, Gauge>::default();
        registry.register(
            "http_requests_inprogress",
            "HTTP requests currently being served",
            http_requests_inprogress.clone(),
        );

        let http_errors_total = Family::<HttpErrorLabels, Counter>::default();
        registry.register(
            "http_errors_total",
            "Total HTTP requests that resulted in an error response",
            http_errors_total.clone(),
        );

        let application_errors_total = Family::<ApplicationErrorLabels, Counter>::default();
        registry.register(
            "application_errors_total",
            "Total application-level errors by type and severity",
            application_errors_total.clone(),
        );

        let blacklist_decisions_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "blacklist_decisions_total",
            "Total decision-service lookups by outcome",
            blacklist_decisions_total.clone(),
        );

        let blacklist_whitelist_hits_total = Counter::default();
        registry.register(
            "blacklist_whitelist_hits_total",
            "Total lookups short-circuited by a whitelist hit",
            blacklist_whitelist_hits_total.clone(),
        );

        let blacklist_entries_total = Family::<EntryCategoryLabel, Gauge>::default();
        registry.register(
            "blacklist_entries_total",
            "Current entry counts by category",
            blacklist_entries_total.clone(),
        );

        let blacklist_db_operations_total = Family::<DbOperationStatusLabels, Counter>::default();
        registry.register(
            "blacklist_db_operations_total",
            "Total database operations by kind and outcome",
            blacklist_db_operations_total.clone(),
        );

        let blacklist_db_operation_duration_seconds =
            Family::<DbOperationLabel, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 12))
            });
        registry.register(
            "blacklist_db_operation_duration_seconds",
            "Database operation latency",
            blacklist_db_operation_duration_seconds.clone(),
        );

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_inprogress,
            http_errors_total,
            application_errors_total,
            blacklist_decisions_total,
            blacklist_whitelist_hits_total,
            blacklist_entries_total,
            blacklist_db_operations_total,
            blacklist_db_operation_duration_seconds,
        }
    }

    /// Renders the registry in Prometheus text exposition format for
    /// `GET /metrics`.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_encodes_a_request() {
        let metrics = Metrics::new();
        metrics
            .http_requests_total
            .get_or_create(&HttpRequestLabels {
                method: "GET".to_string(),
                endpoint: "/health".to_string(),
                status: "200".to_string(),
            })
            .inc();

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("http_requests_total"));
    }

    #[test]
    fn whitelist_hit_counter_has_no_labels() {
        let metrics = Metrics::new();
        metrics.blacklist_whitelist_hits_total.inc();
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("blacklist_whitelist_hits_total"));
    }
}
