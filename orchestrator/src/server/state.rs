//! Server state

use std::sync::Arc;

use crate::costs::tracker::CostTracker;
use crate::deploy::orchestrator::{ActiveEnvironments, DeploySettings};
use crate::engines::factory::EngineFactory;
use crate::storage::history::DeploymentHistory;

/// Shared state for HTTP handlers
pub struct ServerState {
    /// Engine factory, flag-aware
    pub factory: Arc<EngineFactory>,

    /// Cost tracker over the shared ledger
    pub tracker: Arc<CostTracker>,

    /// Deployment history store
    pub history: Arc<DeploymentHistory>,

    /// Environments with a deployment in flight
    pub active: ActiveEnvironments,

    /// Orchestrator configuration
    pub deploy_settings: DeploySettings,
}

impl ServerState {
    pub fn new(
        factory: Arc<EngineFactory>,
        tracker: Arc<CostTracker>,
        history: Arc<DeploymentHistory>,
        active: ActiveEnvironments,
        deploy_settings: DeploySettings,
    ) -> Self {
        Self {
            factory,
            tracker,
            history,
            active,
            deploy_settings,
        }
    }
}
