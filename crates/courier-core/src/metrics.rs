//! Broker instrumentation.
//!
//! Records through the `metrics` facade. Nothing is exported unless the
//! application installs a recorder (for example the Prometheus exporter).

use crate::registry::DeliveryReport;
use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const MESSAGES_ACCEPTED: &str = "courier_messages_accepted_total";
    pub const MESSAGES_REJECTED: &str = "courier_messages_rejected_total";
    pub const MESSAGES_ROUTED: &str = "courier_messages_routed_total";
    pub const MESSAGES_UNROUTABLE: &str = "courier_messages_unroutable_total";
    pub const DELIVERIES: &str = "courier_deliveries_total";
    pub const DELIVERIES_DROPPED: &str = "courier_deliveries_dropped_total";
    pub const SUBSCRIBERS_ACTIVE: &str = "courier_subscribers_active";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_ACCEPTED,
        "Messages accepted into the inbound queue"
    );
    metrics::describe_counter!(
        names::MESSAGES_REJECTED,
        "Messages rejected because the broker was closed"
    );
    metrics::describe_counter!(names::MESSAGES_ROUTED, "Messages taken off the inbound queue");
    metrics::describe_counter!(
        names::MESSAGES_UNROUTABLE,
        "Direct messages whose recipient was not registered"
    );
    metrics::describe_counter!(names::DELIVERIES, "Messages pushed to subscriber endpoints");
    metrics::describe_counter!(
        names::DELIVERIES_DROPPED,
        "Deliveries skipped because the endpoint was full or closed"
    );
    metrics::describe_gauge!(
        names::SUBSCRIBERS_ACTIVE,
        "Current number of registered subscribers"
    );
}

pub(crate) fn record_accepted() {
    counter!(names::MESSAGES_ACCEPTED).increment(1);
}

pub(crate) fn record_rejected() {
    counter!(names::MESSAGES_REJECTED).increment(1);
}

pub(crate) fn record_routed(report: &DeliveryReport, broadcast: bool) {
    let kind = if broadcast { "broadcast" } else { "direct" };
    counter!(names::MESSAGES_ROUTED, "kind" => kind).increment(1);
    counter!(names::DELIVERIES).increment(report.delivered as u64);
    if report.dropped > 0 {
        counter!(names::DELIVERIES_DROPPED).increment(report.dropped as u64);
    }
    if report.unroutable {
        counter!(names::MESSAGES_UNROUTABLE).increment(1);
    }
}

pub(crate) fn set_subscribers(count: usize) {
    gauge!(names::SUBSCRIBERS_ACTIVE).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // Just test that it doesn't panic
        describe_metrics();
        record_accepted();
        record_routed(
            &DeliveryReport {
                delivered: 2,
                dropped: 1,
                unroutable: false,
            },
            true,
        );
        set_subscribers(3);
    }
}
