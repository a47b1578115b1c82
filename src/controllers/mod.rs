//! Kubernetes controllers for the HyperConverged operator
//!
//! This module contains the controller that watches HyperConverged records
//! and their operands and triggers reconciliation.

mod hyperconverged_controller;

pub use hyperconverged_controller::run as run_hyperconverged_controller;

use kube::Client;

use crate::client::KubeClient;
use crate::config::OperatorConfig;

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Typed operand access built on the same client
    pub operand_client: KubeClient,
    /// Process settings
    pub config: OperatorConfig,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            operand_client: KubeClient::new(client.clone()),
            client,
            config,
        }
    }
}
