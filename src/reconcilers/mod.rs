//! Reconcilers for the HyperConverged operator
//!
//! This module contains the business logic of a reconciliation pass.
//! Reconcilers are responsible for:
//! - Driving every operand towards its desired state
//! - Tracking operator upgrades
//! - Computing the HyperConverged status

pub mod hyperconverged;
