use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};


lazy_static! {
    pub static ref REQUESTS_OBSERVED: Counter =
        register_counter!("hippo_requests_observed_total", "Requests seen by the listener").unwrap();
    pub static ref NOTIFICATIONS_QUEUED: Counter =
        register_counter!("hippo_notifications_queued_total", "Notifications queued during requests").unwrap();
    pub static ref NOTIFICATIONS_DROPPED: Counter =
        register_counter!("hippo_notifications_dropped_total", "Queued notifications the worker never received").unwrap();
    pub static ref NOTIFICATIONS_ADMITTED: Counter =
        register_counter!("hippo_notifications_admitted_total", "Notifications admitted by the gate").unwrap();
    pub static ref NOTIFICATIONS_RATE_LIMITED: Counter =
        register_counter!("hippo_notifications_rate_limited_total", "Notifications suppressed by the gate").unwrap();
    pub static ref NOTIFICATIONS_DISABLED: Counter =
        register_counter!("hippo_notifications_disabled_total", "Notifications skipped because delivery is disabled").unwrap();
    pub static ref NOTIFICATIONS_DELIVERED: Counter =
        register_counter!("hippo_notifications_delivered_total", "Notifications accepted by the webhook").unwrap();
    pub static ref DELIVERY_FAILURES: Counter =
        register_counter!("hippo_delivery_failures_total", "Failed webhook deliveries").unwrap();
    pub static ref GATE_FAILURES: Counter =
        register_counter!("hippo_gate_failures_total", "Lock or persist failures in the gate").unwrap();
    pub static ref PERFORMANCE_LOG_FAILURES: Counter =
        register_counter!("hippo_performance_log_failures_total", "Failed performance log writes").unwrap();
    pub static ref HANDLER_PANICS: Counter =
        register_counter!("hippo_handler_panics_total", "Handlers that panicked inside the listener").unwrap();
    pub static ref ANALYSIS_FAILURES: Counter =
        register_counter!("hippo_analysis_failures_total", "Requests whose notification analysis panicked").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "hippo_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}
