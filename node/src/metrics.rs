//! Prometheus metrics for the sanka service.
//!
//! [`ServiceMetrics`] owns a dedicated [`Registry`] and is fed from the
//! service's [`EventBus`](crate::EventBus). The HTTP `/metrics` endpoint
//! renders it with [`ServiceMetrics::encode_text`].

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, HistogramOpts,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::ServiceEvent;

/// Central collection of all service-level Prometheus metrics.
pub struct ServiceMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub members_registered: IntCounter,
    pub activities_created: IntCounter,
    pub joins: IntCounter,
    /// Refused joins, labelled by error code.
    pub joins_refused: IntCounterVec,
    /// New verification requests, labelled by kind.
    pub verifications_submitted: IntCounterVec,
    /// Resolved requests, labelled by terminal status.
    pub verifications_resolved: IntCounterVec,
    /// Points credited by approved verifications.
    pub points_awarded: IntCounter,
    /// Failed operations, labelled by operation and error class.
    pub operation_failures: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Number of registered members.
    pub member_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of successful operations, in milliseconds.
    pub operation_duration_ms: HistogramVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let members_registered = register_int_counter_with_registry!(
            Opts::new("sanka_members_registered_total", "Members registered"),
            registry
        )?;
        let activities_created = register_int_counter_with_registry!(
            Opts::new("sanka_activities_created_total", "Activities created"),
            registry
        )?;
        let joins = register_int_counter_with_registry!(
            Opts::new("sanka_joins_total", "Completed activity joins"),
            registry
        )?;
        let joins_refused = register_int_counter_vec_with_registry!(
            Opts::new("sanka_joins_refused_total", "Refused activity joins"),
            &["reason"],
            registry
        )?;
        let verifications_submitted = register_int_counter_vec_with_registry!(
            Opts::new(
                "sanka_verifications_submitted_total",
                "Verification requests submitted"
            ),
            &["kind"],
            registry
        )?;
        let verifications_resolved = register_int_counter_vec_with_registry!(
            Opts::new(
                "sanka_verifications_resolved_total",
                "Verification requests resolved"
            ),
            &["status"],
            registry
        )?;
        let points_awarded = register_int_counter_with_registry!(
            Opts::new(
                "sanka_points_awarded_total",
                "Points credited by approved verifications"
            ),
            registry
        )?;
        let operation_failures = register_int_counter_vec_with_registry!(
            Opts::new("sanka_operation_failures_total", "Failed service operations"),
            &["operation", "class"],
            registry
        )?;

        let member_count = register_int_gauge_with_registry!(
            Opts::new("sanka_member_count", "Registered members"),
            registry
        )?;

        // 0.5 ms → ~8 s.
        let operation_duration_ms = register_histogram_vec_with_registry!(
            HistogramOpts::new(
                "sanka_operation_duration_ms",
                "Service operation time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.5, 2.0, 15)?),
            &["operation"],
            registry
        )?;

        Ok(Self {
            registry,
            members_registered,
            activities_created,
            joins,
            joins_refused,
            verifications_submitted,
            verifications_resolved,
            points_awarded,
            operation_failures,
            member_count,
            operation_duration_ms,
        })
    }

    /// Update the metrics for one service event.
    pub fn observe(&self, event: &ServiceEvent) {
        match event {
            ServiceEvent::MemberRegistered { .. } => {
                self.members_registered.inc();
                self.member_count.inc();
            }
            ServiceEvent::ActivityCreated { .. } => self.activities_created.inc(),
            ServiceEvent::Joined { .. } => self.joins.inc(),
            ServiceEvent::JoinRefused { code, .. } => {
                self.joins_refused.with_label_values(&[*code]).inc();
            }
            ServiceEvent::VerificationSubmitted { kind, .. } => {
                self.verifications_submitted
                    .with_label_values(&[kind.as_str()])
                    .inc();
            }
            ServiceEvent::VerificationResolved {
                status, awarded, ..
            } => {
                self.verifications_resolved
                    .with_label_values(&[status.as_str()])
                    .inc();
                if let Some(points) = awarded {
                    self.points_awarded.inc_by(points.raw());
                }
            }
            ServiceEvent::OperationFailed { operation, class } => {
                self.operation_failures
                    .with_label_values(&[*operation, class.as_str()])
                    .inc();
            }
            ServiceEvent::OperationCompleted { operation, elapsed } => {
                self.operation_duration_ms
                    .with_label_values(&[*operation])
                    .observe(elapsed.as_secs_f64() * 1000.0);
            }
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorClass;
    use sanka_types::{MemberId, Points, RequestId, VerificationStatus};
    use std::time::Duration;

    #[test]
    fn events_move_the_right_series() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.observe(&ServiceEvent::MemberRegistered {
            member: MemberId::parse("hana").unwrap(),
            balance: Points::new(20),
        });
        metrics.observe(&ServiceEvent::VerificationResolved {
            request: RequestId::new(1),
            status: VerificationStatus::Approved,
            awarded: Some(Points::new(10)),
        });
        metrics.observe(&ServiceEvent::OperationFailed {
            operation: "join",
            class: ErrorClass::Resource,
        });
        metrics.observe(&ServiceEvent::OperationCompleted {
            operation: "join",
            elapsed: Duration::from_millis(3),
        });

        assert_eq!(metrics.members_registered.get(), 1);
        assert_eq!(metrics.member_count.get(), 1);
        assert_eq!(metrics.points_awarded.get(), 10);
        assert_eq!(
            metrics
                .operation_failures
                .with_label_values(&["join", "resource"])
                .get(),
            1
        );
    }

    #[test]
    fn text_encoding_names_every_family() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.joins.inc();
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("sanka_joins_total 1"));
        assert!(text.contains("sanka_member_count 0"));
    }
}
