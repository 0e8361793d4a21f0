use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("skincare_requests_total", "Total number of API requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter = register_counter!(
        "skincare_rate_limited_total",
        "Requests rejected by the rate limiter"
    )
    .unwrap();
    pub static ref GENERATION_FAILURES: Counter = register_counter!(
        "skincare_generation_failures_total",
        "Generation calls that exhausted their retry budget"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "skincare_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}
