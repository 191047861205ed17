//! Metrics for the translator hub
//!
//! Counters and gauges are registered lazily in the default Prometheus
//! registry and exposed by [`metrics_endpoint`].

mod prometheus;

pub use self::prometheus::*;
