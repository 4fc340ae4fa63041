//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::costs::ledger::CostLedger;
use crate::costs::tracker::{CostSettings, CostTracker};
use crate::deploy::orchestrator::{active_environments, ActiveEnvironments, DeploySettings};
use crate::engines::factory::EngineFactory;
use crate::engines::flags::FeatureFlags;
use crate::errors::PipeformError;
use crate::storage::history::DeploymentHistory;

/// Main application state
pub struct AppState {
    /// Engine factory with injected feature flags
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

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, PipeformError> {
        info!("Initializing application state...");

        let flags = FeatureFlags::load(&options.layout.feature_flags_file()).await?;
        let factory = Arc::new(EngineFactory::new(&options.settings, flags));

        let ledger = CostLedger::new(options.layout.ledger_file());
        let tracker = Arc::new(CostTracker::new(
            ledger,
            CostSettings {
                cost_per_hour: options.settings.cost_per_hour,
            },
        ));

        let history = Arc::new(DeploymentHistory::new(options.layout.history_file()));

        Ok(Self {
            factory,
            tracker,
            history,
            active: active_environments(),
            deploy_settings: DeploySettings {
                prod_environments: options.settings.prod_environments.clone(),
            },
        })
    }
}
