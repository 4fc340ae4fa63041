//! Deployment orchestration state machine
//!
//! Drives one deployment through its six stages, recording a step per stage
//! and handing the outcome to the cost tracker and the history store. Steps
//! are strictly sequential; the engine subprocess call is the only
//! suspension point.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::costs::tracker::CostTracker;
use crate::deploy::safety::{extract_compute_hours, has_breaking_changes, has_data_loss_risk};
use crate::engines::EngineAdapter;
use crate::errors::PipeformError;
use crate::models::deployment::{Deployment, DeploymentStatus, StepName};
use crate::storage::history::DeploymentHistory;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct DeploySettings {
    /// Environments treated as production targets
    pub prod_environments: Vec<String>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            prod_environments: vec!["prod".to_string()],
        }
    }
}

/// Set of environments with a deployment currently in flight.
///
/// Shared across orchestrator instances so concurrent deployments can never
/// target the same environment.
pub type ActiveEnvironments = Arc<Mutex<HashSet<String>>>;

/// Create an empty active-environment set
pub fn active_environments() -> ActiveEnvironments {
    Arc::new(Mutex::new(HashSet::new()))
}

/// Holds an environment slot for the duration of one deployment
struct EnvironmentLease {
    environment: String,
    active: ActiveEnvironments,
}

impl EnvironmentLease {
    fn acquire(
        active: &ActiveEnvironments,
        environment: &str,
    ) -> Result<EnvironmentLease, PipeformError> {
        let mut held = active.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(environment.to_string()) {
            return Err(PipeformError::DeployError(format!(
                "a deployment is already in progress for environment '{}'",
                environment
            )));
        }
        Ok(EnvironmentLease {
            environment: environment.to_string(),
            active: active.clone(),
        })
    }
}

impl Drop for EnvironmentLease {
    fn drop(&mut self) {
        let mut held = self.active.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.environment);
    }
}

/// Drives deployments for one engine adapter
pub struct DeploymentOrchestrator {
    engine: Arc<dyn EngineAdapter>,
    tracker: Arc<CostTracker>,
    history: Arc<DeploymentHistory>,
    active: ActiveEnvironments,
    settings: DeploySettings,
}

impl DeploymentOrchestrator {
    pub fn new(
        engine: Arc<dyn EngineAdapter>,
        tracker: Arc<CostTracker>,
        history: Arc<DeploymentHistory>,
        active: ActiveEnvironments,
        settings: DeploySettings,
    ) -> Self {
        Self {
            engine,
            tracker,
            history,
            active,
            settings,
        }
    }

    fn is_prod(&self, environment: &str) -> bool {
        self.settings
            .prod_environments
            .iter()
            .any(|e| e == environment)
    }

    /// Run one deployment to its terminal state.
    ///
    /// Returns the terminal deployment record; a failed deployment is a
    /// valid outcome, not an `Err`. Errors are reserved for accounting and
    /// history persistence, which must never be silently lost.
    pub async fn deploy(&self, environment: &str) -> Result<Deployment, PipeformError> {
        let _lease = EnvironmentLease::acquire(&self.active, environment)?;

        let mut deployment = Deployment::new(environment);
        info!(
            "Starting deployment {} to '{}' via {}",
            deployment.id,
            environment,
            self.engine.kind()
        );

        let outcome = self.run_steps(&mut deployment, environment).await;
        deployment.completed_at = Some(chrono::Utc::now());

        match outcome {
            Ok(plan_hint) => {
                deployment.status = Some(DeploymentStatus::Completed);
                info!(
                    "Deployment {} completed in {} ms",
                    deployment.id,
                    deployment.duration_ms().unwrap_or(0)
                );

                let compute_hours = plan_hint.unwrap_or_else(|| measured_hours(&deployment));
                self.tracker
                    .track_execution(environment, compute_hours)
                    .await?;
            }
            Err(e) => {
                error!("Deployment {} failed: {}", deployment.id, e);
                deployment.status = Some(DeploymentStatus::Failed);
                deployment.error = Some(e.to_string());
                self.rollback(&mut deployment).await;
            }
        }

        self.history.append(&deployment).await?;
        Ok(deployment)
    }

    /// Steps 1-6; records the failing step before returning its error.
    ///
    /// On success, returns the compute-hours hint extracted from the plan
    /// output, when the bridge provided one.
    async fn run_steps(
        &self,
        deployment: &mut Deployment,
        environment: &str,
    ) -> Result<Option<f64>, PipeformError> {
        // 1. pre_validation: tests plus a destructive-diff screen
        let tests = match self.engine.test(None).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::PreValidation, &e.to_string());
                return Err(e);
            }
        };
        if !tests.success {
            let message = format!("Pre-deployment validation failed: {}", tests.reason());
            deployment.fail_step(StepName::PreValidation, &message);
            return Err(PipeformError::ValidationError(message));
        }

        let diff = match self.engine.diff(environment).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::PreValidation, &e.to_string());
                return Err(e);
            }
        };
        if has_breaking_changes(&diff.stdout) {
            let message = format!(
                "Pre-deployment validation failed: breaking schema changes detected in diff against '{}'",
                environment
            );
            deployment.fail_step(StepName::PreValidation, &message);
            return Err(PipeformError::ValidationError(message));
        }

        let mut pre_output = diff.stdout.clone();
        if has_data_loss_risk(&diff.stdout) {
            warn!(
                "Deployment {} diff contains potential data-loss statements",
                deployment.id
            );
            pre_output.push_str("\n[warning] potential data loss detected in diff");
        }
        deployment.complete_step(StepName::PreValidation, Some(pre_output));

        // 2. create_shadow: plan without applying
        let plan = match self.engine.plan(environment, self.is_prod(environment)).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::CreateShadow, &e.to_string());
                return Err(e);
            }
        };
        if !plan.success {
            let message = format!("Shadow creation failed: {}", plan.reason());
            deployment.fail_step(StepName::CreateShadow, &message);
            return Err(PipeformError::DeployError(message));
        }
        let plan_hint = extract_compute_hours(&plan.stdout);
        deployment.complete_step(StepName::CreateShadow, Some(plan.stdout));

        // 3. shadow_validation: audits and tests against the shadow
        let audit = match self.engine.audit(None).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::ShadowValidation, &e.to_string());
                return Err(e);
            }
        };
        if !audit.success {
            let message = format!("Shadow validation failed (audit): {}", audit.reason());
            deployment.fail_step(StepName::ShadowValidation, &message);
            return Err(PipeformError::ValidationError(message));
        }
        let shadow_tests = match self.engine.test(None).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::ShadowValidation, &e.to_string());
                return Err(e);
            }
        };
        if !shadow_tests.success {
            let message = format!("Shadow validation failed (tests): {}", shadow_tests.reason());
            deployment.fail_step(StepName::ShadowValidation, &message);
            return Err(PipeformError::ValidationError(message));
        }
        deployment.complete_step(StepName::ShadowValidation, None);

        // 4. safety_checks: the diff may have changed since step 1
        let recheck = match self.engine.diff(environment).await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::SafetyChecks, &e.to_string());
                return Err(e);
            }
        };
        if has_breaking_changes(&recheck.stdout) {
            let message = format!(
                "Safety checks failed: destructive change appeared before swap into '{}'",
                environment
            );
            deployment.fail_step(StepName::SafetyChecks, &message);
            return Err(PipeformError::ValidationError(message));
        }
        deployment.complete_step(StepName::SafetyChecks, None);

        // 5. atomic_swap: promote the shadow
        let swap = match self.engine.migrate(environment).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("Atomic swap failed: {}", e);
                deployment.fail_step(StepName::AtomicSwap, &message);
                return Err(PipeformError::DeployError(message));
            }
        };
        if !swap.success {
            let message = format!("Atomic swap failed: {}", swap.reason());
            deployment.fail_step(StepName::AtomicSwap, &message);
            return Err(PipeformError::DeployError(message));
        }
        deployment.complete_step(StepName::AtomicSwap, Some(swap.stdout));

        // 6. post_validation: the environment must answer a status probe
        let status = match self.engine.get_status().await {
            Ok(result) => result,
            Err(e) => {
                deployment.fail_step(StepName::PostValidation, &e.to_string());
                return Err(e);
            }
        };
        if !status.success {
            let message = format!("Post-deployment validation failed: {}", status.reason());
            deployment.fail_step(StepName::PostValidation, &message);
            return Err(PipeformError::ValidationError(message));
        }
        deployment.complete_step(StepName::PostValidation, None);

        Ok(plan_hint)
    }

    /// Lightweight recovery: the engine's migration is transactional, so no
    /// corrective command is re-run. The step records that recovery ran; an
    /// error here lands in `rollback_error` and never masks the original
    /// failure.
    async fn rollback(&self, deployment: &mut Deployment) {
        info!("Rolling back deployment {}", deployment.id);

        match self.perform_rollback(deployment).await {
            Ok(note) => deployment.complete_step(StepName::Rollback, Some(note)),
            Err(e) => {
                error!("Rollback for {} errored: {}", deployment.id, e);
                deployment.fail_step(StepName::Rollback, &e.to_string());
                deployment.rollback_error = Some(e.to_string());
            }
        }
    }

    async fn perform_rollback(
        &self,
        deployment: &Deployment,
    ) -> Result<String, PipeformError> {
        warn!(
            "Deployment {} to '{}' recovered without corrective action",
            deployment.id, deployment.environment
        );
        Ok(format!(
            "engine '{}' migrations are transactional; no corrective action required",
            self.engine.kind()
        ))
    }
}

/// Wall-clock deployment duration expressed in compute hours
fn measured_hours(deployment: &Deployment) -> f64 {
    let millis = deployment.duration_ms().unwrap_or(0).max(0) as f64;
    millis / 3_600_000.0
}
