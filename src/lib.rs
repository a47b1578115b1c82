//! HyperConverged Kubernetes Operator
//!
//! This operator keeps the operands of a HyperConverged record (KubeVirt,
//! its config map and its priority class) in line with the record.

pub mod client;
pub mod conditions;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod operands;
pub mod reconcilers;

pub use error::{Error, Result};
