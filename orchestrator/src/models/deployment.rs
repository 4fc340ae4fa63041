//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stages of a deployment, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    PreValidation,
    CreateShadow,
    ShadowValidation,
    SafetyChecks,
    AtomicSwap,
    PostValidation,
    Rollback,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::PreValidation => "pre_validation",
            StepName::CreateShadow => "create_shadow",
            StepName::ShadowValidation => "shadow_validation",
            StepName::SafetyChecks => "safety_checks",
            StepName::AtomicSwap => "atomic_swap",
            StepName::PostValidation => "post_validation",
            StepName::Rollback => "rollback",
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// One named stage within a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: StepName,
    pub status: StepStatus,

    /// Captured engine output, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Triggering error for a failed step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal status of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Completed,
    Failed,
}

/// One attempt to promote a transformation project into an environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Unique deployment ID, immutable after creation
    pub id: String,

    /// Target environment name
    pub environment: String,

    /// Steps in execution order, append-only
    pub steps: Vec<Step>,

    /// Terminal status; absent while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,

    /// Present only when the deployment failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error captured while attempting rollback, never masks `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deployment {
    /// Create a new deployment for an environment
    pub fn new(environment: &str) -> Self {
        Self {
            id: generate_deployment_id(),
            environment: environment.to_string(),
            steps: Vec::new(),
            status: None,
            error: None,
            rollback_error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Append a completed step
    pub fn complete_step(&mut self, name: StepName, output: Option<String>) {
        self.steps.push(Step {
            name,
            status: StepStatus::Completed,
            output,
            error: None,
        });
    }

    /// Append a failed step
    pub fn fail_step(&mut self, name: StepName, error: &str) {
        self.steps.push(Step {
            name,
            status: StepStatus::Failed,
            output: None,
            error: Some(error.to_string()),
        });
    }

    /// Find a step by name
    pub fn step(&self, name: StepName) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Deployment duration in milliseconds, when terminal
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}

/// Generate a unique deployment ID: epoch millis plus a random suffix
pub fn generate_deployment_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("deploy-{}-{}", millis, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_ids_are_unique() {
        let ids: Vec<String> = (0..64).map(|_| generate_deployment_id()).collect();
        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_step_recording_order() {
        let mut deployment = Deployment::new("staging");
        deployment.complete_step(StepName::PreValidation, None);
        deployment.fail_step(StepName::CreateShadow, "plan failed");

        assert_eq!(deployment.steps.len(), 2);
        assert_eq!(deployment.steps[0].name, StepName::PreValidation);
        assert_eq!(deployment.steps[0].status, StepStatus::Completed);
        assert_eq!(deployment.steps[1].name, StepName::CreateShadow);
        assert_eq!(deployment.steps[1].status, StepStatus::Failed);
        assert_eq!(deployment.steps[1].error.as_deref(), Some("plan failed"));
    }

    #[test]
    fn test_step_serializes_snake_case() {
        let mut deployment = Deployment::new("dev");
        deployment.complete_step(StepName::AtomicSwap, None);
        let json = serde_json::to_string(&deployment).unwrap();
        assert!(json.contains("\"atomic_swap\""));
    }
}
