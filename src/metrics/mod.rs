//! Prometheus metrics for the HyperConverged operator

mod prometheus;

pub use prometheus::*;
