//! Deployment state-machine tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pipeform::costs::ledger::CostLedger;
use pipeform::costs::tracker::{CostSettings, CostTracker};
use pipeform::deploy::orchestrator::{
    active_environments, DeploySettings, DeploymentOrchestrator,
};
use pipeform::engines::{EngineAdapter, EngineKind, EngineResult};
use pipeform::errors::PipeformError;
use pipeform::filesys::file::File;
use pipeform::models::deployment::{DeploymentStatus, StepName, StepStatus};
use pipeform::storage::history::DeploymentHistory;

/// Scriptable engine adapter
#[derive(Debug)]
struct MockEngine {
    status_success: bool,
    test_success: bool,
    audit_success: bool,
    migrate_success: bool,
    diff_output: String,
    plan_output: String,
    call_delay: Duration,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            status_success: true,
            test_success: true,
            audit_success: true,
            migrate_success: true,
            diff_output: "CREATE TABLE orders_v2 (id int);".to_string(),
            plan_output: "plan ready\nestimated compute hours: 2.0".to_string(),
            call_delay: Duration::ZERO,
        }
    }
}

impl MockEngine {
    fn ok(stdout: &str) -> EngineResult {
        EngineResult {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
            error: None,
        }
    }

    fn failed(reason: &str) -> EngineResult {
        EngineResult {
            success: false,
            stdout: String::new(),
            stderr: reason.to_string(),
            error: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl EngineAdapter for MockEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlmesh
    }

    async fn get_status(&self) -> Result<EngineResult, PipeformError> {
        Ok(if self.status_success {
            Self::ok("ready")
        } else {
            Self::failed("environment unreachable")
        })
    }

    async fn test(&self, _target: Option<&str>) -> Result<EngineResult, PipeformError> {
        tokio::time::sleep(self.call_delay).await;
        Ok(if self.test_success {
            Self::ok("12 tests passed")
        } else {
            Self::failed("model test orders_rollup failed")
        })
    }

    async fn audit(&self, _target: Option<&str>) -> Result<EngineResult, PipeformError> {
        Ok(if self.audit_success {
            Self::ok("all audits passed")
        } else {
            Self::failed("audit not_null_order_id failed")
        })
    }

    async fn diff(&self, _environment: &str) -> Result<EngineResult, PipeformError> {
        Ok(Self::ok(&self.diff_output))
    }

    async fn plan(&self, _environment: &str, _is_prod: bool) -> Result<EngineResult, PipeformError> {
        Ok(Self::ok(&self.plan_output))
    }

    async fn migrate(&self, _environment: &str) -> Result<EngineResult, PipeformError> {
        Ok(if self.migrate_success {
            Self::ok("promoted")
        } else {
            Self::failed("snapshot promotion conflict")
        })
    }

    async fn validate_installation(&self) -> bool {
        true
    }
}

struct Fixture {
    orchestrator: DeploymentOrchestrator,
    tracker: Arc<CostTracker>,
    _dir: tempfile::TempDir,
}

fn fixture(engine: MockEngine) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let ledger = CostLedger::new(File::new(dir.path().join("ledger.json")));
    let tracker = Arc::new(CostTracker::new(ledger, CostSettings { cost_per_hour: 2.0 }));
    let history = Arc::new(DeploymentHistory::new(File::new(
        dir.path().join("history.json"),
    )));
    let orchestrator = DeploymentOrchestrator::new(
        Arc::new(engine),
        tracker.clone(),
        history.clone(),
        active_environments(),
        DeploySettings::default(),
    );
    Fixture {
        orchestrator,
        tracker,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_successful_deployment_runs_all_six_steps() {
    let fx = fixture(MockEngine::default());

    let deployment = fx.orchestrator.deploy("dev").await.unwrap();

    assert_eq!(deployment.status, Some(DeploymentStatus::Completed));
    assert!(deployment.error.is_none());
    assert!(deployment.completed_at.is_some());

    let names: Vec<StepName> = deployment.steps.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec![
            StepName::PreValidation,
            StepName::CreateShadow,
            StepName::ShadowValidation,
            StepName::SafetyChecks,
            StepName::AtomicSwap,
            StepName::PostValidation,
        ]
    );
    assert!(deployment
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn test_successful_deployment_tracks_compute_from_plan_hint() {
    let fx = fixture(MockEngine::default());

    fx.orchestrator.deploy("dev").await.unwrap();

    // dev is virtual: the 2.0 h hint lands entirely in saved cost at $2/h
    let records = fx
        .tracker
        .environment_breakdown()
        .await
        .unwrap();
    let usage = records.get("dev").expect("dev usage recorded");
    assert_eq!(usage.count, 1);
    assert_eq!(usage.compute_hours, 2.0);
    assert_eq!(usage.cost, 0.0);
    assert_eq!(usage.saved_cost, 4.0);
}

#[tokio::test]
async fn test_failing_tests_abort_before_any_swap() {
    let fx = fixture(MockEngine {
        test_success: false,
        ..Default::default()
    });

    let deployment = fx.orchestrator.deploy("staging").await.unwrap();

    assert_eq!(deployment.status, Some(DeploymentStatus::Failed));
    let error = deployment.error.as_deref().unwrap();
    assert!(error.contains("Pre-deployment validation failed"));

    assert!(deployment.step(StepName::AtomicSwap).is_none());
    assert_eq!(
        deployment.step(StepName::PreValidation).unwrap().status,
        StepStatus::Failed
    );

    // No execution is accounted for a failed deployment
    let breakdown = fx.tracker.environment_breakdown().await.unwrap();
    assert!(breakdown.is_empty());
}

#[tokio::test]
async fn test_breaking_diff_aborts_deployment() {
    let fx = fixture(MockEngine {
        diff_output: "ALTER TABLE users DROP COLUMN email;".to_string(),
        ..Default::default()
    });

    let deployment = fx.orchestrator.deploy("prod").await.unwrap();

    assert_eq!(deployment.status, Some(DeploymentStatus::Failed));
    assert!(deployment
        .error
        .as_deref()
        .unwrap()
        .contains("breaking schema changes"));
    assert!(deployment.step(StepName::CreateShadow).is_none());
}

#[tokio::test]
async fn test_failed_swap_records_rollback_last() {
    let fx = fixture(MockEngine {
        migrate_success: false,
        ..Default::default()
    });

    let deployment = fx.orchestrator.deploy("prod").await.unwrap();

    assert_eq!(deployment.status, Some(DeploymentStatus::Failed));
    assert!(deployment
        .error
        .as_deref()
        .unwrap()
        .contains("Atomic swap failed"));
    assert!(deployment.rollback_error.is_none());

    let names: Vec<StepName> = deployment.steps.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec![
            StepName::PreValidation,
            StepName::CreateShadow,
            StepName::ShadowValidation,
            StepName::SafetyChecks,
            StepName::AtomicSwap,
            StepName::Rollback,
        ]
    );

    for step in &deployment.steps {
        match step.name {
            StepName::AtomicSwap => assert_eq!(step.status, StepStatus::Failed),
            _ => assert_eq!(step.status, StepStatus::Completed),
        }
    }
}

#[tokio::test]
async fn test_post_validation_failure_is_terminal() {
    let fx = fixture(MockEngine {
        status_success: false,
        ..Default::default()
    });

    let deployment = fx.orchestrator.deploy("staging").await.unwrap();

    assert_eq!(deployment.status, Some(DeploymentStatus::Failed));
    assert!(deployment
        .error
        .as_deref()
        .unwrap()
        .contains("Post-deployment validation failed"));
    assert_eq!(
        deployment.steps.last().unwrap().name,
        StepName::Rollback
    );
}

#[tokio::test]
async fn test_concurrent_deployments_to_same_environment_are_rejected() {
    let fx = fixture(MockEngine {
        call_delay: Duration::from_millis(100),
        ..Default::default()
    });

    let (first, second) = tokio::join!(
        fx.orchestrator.deploy("staging"),
        fx.orchestrator.deploy("staging"),
    );

    // Exactly one of the two runs; the other is rejected up front
    let outcomes = [first, second];
    let rejected: Vec<String> = outcomes
        .iter()
        .filter(|r| r.is_err())
        .map(|r| r.as_ref().unwrap_err().to_string())
        .collect();
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].contains("already in progress"));
}

#[tokio::test]
async fn test_deployment_ids_differ_across_runs() {
    let fx = fixture(MockEngine::default());

    let first = fx.orchestrator.deploy("dev").await.unwrap();
    let second = fx.orchestrator.deploy("dev").await.unwrap();

    assert_ne!(first.id, second.id);
}
