//! Cost tracking and savings analytics

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::costs::ledger::{CostLedger, ExecutionRecord};
use crate::errors::PipeformError;
use crate::utils::{format1, round1};

/// Reporting periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsPeriod {
    Month,
    Quarter,
}

impl SavingsPeriod {
    pub fn days(&self) -> i64 {
        match self {
            SavingsPeriod::Month => 30,
            SavingsPeriod::Quarter => 90,
        }
    }

    pub fn parse(name: &str) -> Option<SavingsPeriod> {
        match name.trim().to_lowercase().as_str() {
            "month" => Some(SavingsPeriod::Month),
            "quarter" => Some(SavingsPeriod::Quarter),
            _ => None,
        }
    }
}

/// Period-filtered ledger aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsSummary {
    pub period: SavingsPeriod,
    pub physical_compute_hours: f64,
    pub virtual_compute_hours: f64,
    pub cost: f64,
    pub saved_cost: f64,

    /// What the period would have cost had every hour been billed
    pub potential_cost: f64,

    /// `saved / (cost + saved)`, one decimal; 0 for an empty denominator
    pub savings_percentage: f64,
}

/// Return-on-investment projection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSummary {
    pub quarterly_savings: f64,
    pub yearly_savings: f64,
    pub roi: String,
    pub payback_period_months: String,
    pub break_even: bool,
}

/// Per-environment usage rollup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentUsage {
    pub count: u64,
    pub compute_hours: f64,
    pub cost: f64,
    pub saved_cost: f64,
}

/// Cost tracker settings
#[derive(Debug, Clone)]
pub struct CostSettings {
    /// Billed rate in dollars per compute hour
    pub cost_per_hour: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self { cost_per_hour: 2.5 }
    }
}

/// Classifies executions, writes the ledger and derives savings metrics
pub struct CostTracker {
    ledger: CostLedger,
    settings: CostSettings,
}

impl CostTracker {
    pub fn new(ledger: CostLedger, settings: CostSettings) -> Self {
        Self { ledger, settings }
    }

    /// Whether compute in `environment` is free preview capacity.
    ///
    /// `dev` and anything prefixed `feature` (any separator) is virtual;
    /// everything else, `staging` and `prod` included, is billed.
    pub fn is_virtual_environment(environment: &str) -> bool {
        environment == "dev" || environment.starts_with("feature")
    }

    /// Record one execution, classified and priced
    pub async fn track_execution(
        &self,
        environment: &str,
        compute_hours: f64,
    ) -> Result<ExecutionRecord, PipeformError> {
        let is_virtual = Self::is_virtual_environment(environment);
        let rate = self.settings.cost_per_hour;

        let record = ExecutionRecord {
            timestamp: Utc::now(),
            environment: environment.to_string(),
            is_virtual,
            physical_compute_hours: if is_virtual { 0.0 } else { compute_hours },
            virtual_compute_hours: if is_virtual { compute_hours } else { 0.0 },
            cost: if is_virtual { 0.0 } else { compute_hours * rate },
            saved_cost: if is_virtual { compute_hours * rate } else { 0.0 },
        };

        debug!(
            "Tracked {} execution in '{}': {:.3} h",
            if is_virtual { "virtual" } else { "physical" },
            environment,
            compute_hours
        );

        self.ledger.append(record.clone()).await?;
        Ok(record)
    }

    /// Sum the ledger over a trailing period
    pub async fn calculate_savings(
        &self,
        period: SavingsPeriod,
    ) -> Result<SavingsSummary, PipeformError> {
        let cutoff = Utc::now() - Duration::days(period.days());
        let records = self.ledger.records().await?;

        let mut physical = 0.0;
        let mut virtual_hours = 0.0;
        let mut cost = 0.0;
        let mut saved = 0.0;
        for record in records.iter().filter(|r| r.timestamp >= cutoff) {
            physical += record.physical_compute_hours;
            virtual_hours += record.virtual_compute_hours;
            cost += record.cost;
            saved += record.saved_cost;
        }

        let denominator = cost + saved;
        let savings_percentage = if denominator > 0.0 {
            round1(saved / denominator * 100.0)
        } else {
            0.0
        };

        Ok(SavingsSummary {
            period,
            physical_compute_hours: physical,
            virtual_compute_hours: virtual_hours,
            cost,
            saved_cost: saved,
            potential_cost: (physical + virtual_hours) * self.settings.cost_per_hour,
            savings_percentage,
        })
    }

    /// Rule-based advisory strings for a period summary
    pub fn generate_recommendations(metrics: &SavingsSummary) -> Vec<String> {
        let mut recommendations = Vec::new();

        if metrics.savings_percentage < 30.0 {
            recommendations.push(
                "Savings are below 30%; shift more development and validation work into \
                 virtual environments (dev, feature branches)."
                    .to_string(),
            );
        }

        if metrics.physical_compute_hours > 100.0 {
            recommendations.push(format!(
                "{:.0} physical compute hours this period; review whether staging runs \
                 can preview against virtual environments instead.",
                metrics.physical_compute_hours
            ));
        }

        if metrics.savings_percentage >= 50.0 {
            recommendations.push(format!(
                "Savings at {:.1}%; virtual-first workflow is paying off.",
                metrics.savings_percentage
            ));
        }

        recommendations
    }

    /// Project yearly ROI from the trailing quarter
    pub async fn calculate_roi(
        &self,
        implementation_cost: f64,
    ) -> Result<RoiSummary, PipeformError> {
        let quarterly_savings = self.calculate_savings(SavingsPeriod::Quarter).await?.saved_cost;
        let yearly_savings = quarterly_savings * 4.0;

        let roi = (yearly_savings - implementation_cost) / implementation_cost * 100.0;
        let payback_period_months = implementation_cost / (yearly_savings / 12.0);

        Ok(RoiSummary {
            quarterly_savings,
            yearly_savings,
            roi: format1(roi),
            payback_period_months: format1(payback_period_months),
            break_even: payback_period_months <= 12.0,
        })
    }

    /// Group every ledger record by environment
    pub async fn environment_breakdown(
        &self,
    ) -> Result<BTreeMap<String, EnvironmentUsage>, PipeformError> {
        let records = self.ledger.records().await?;

        let mut breakdown: BTreeMap<String, EnvironmentUsage> = BTreeMap::new();
        for record in records {
            let usage = breakdown.entry(record.environment.clone()).or_default();
            usage.count += 1;
            usage.compute_hours += record.physical_compute_hours + record.virtual_compute_hours;
            usage.cost += record.cost;
            usage.saved_cost += record.saved_cost;
        }

        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_environment_classification() {
        assert!(CostTracker::is_virtual_environment("dev"));
        assert!(CostTracker::is_virtual_environment("feature-login"));
        assert!(CostTracker::is_virtual_environment("feature/checkout"));
        assert!(CostTracker::is_virtual_environment("feature_x"));

        assert!(!CostTracker::is_virtual_environment("staging"));
        assert!(!CostTracker::is_virtual_environment("prod"));
        assert!(!CostTracker::is_virtual_environment("devops"));
        assert!(!CostTracker::is_virtual_environment("qa"));
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(SavingsPeriod::parse("month"), Some(SavingsPeriod::Month));
        assert_eq!(SavingsPeriod::parse(" Quarter "), Some(SavingsPeriod::Quarter));
        assert_eq!(SavingsPeriod::parse("year"), None);
    }

    #[test]
    fn test_recommendations_low_savings() {
        let metrics = SavingsSummary {
            period: SavingsPeriod::Month,
            physical_compute_hours: 10.0,
            virtual_compute_hours: 2.0,
            cost: 25.0,
            saved_cost: 5.0,
            potential_cost: 30.0,
            savings_percentage: 16.7,
        };
        let recommendations = CostTracker::generate_recommendations(&metrics);
        assert_eq!(recommendations.len(), 1);
        assert!(recommendations[0].contains("below 30%"));
    }

    #[test]
    fn test_recommendations_congratulate_high_savings() {
        let metrics = SavingsSummary {
            period: SavingsPeriod::Month,
            physical_compute_hours: 1.0,
            virtual_compute_hours: 9.0,
            cost: 2.5,
            saved_cost: 22.5,
            potential_cost: 25.0,
            savings_percentage: 90.0,
        };
        let recommendations = CostTracker::generate_recommendations(&metrics);
        assert_eq!(recommendations.len(), 1);
        assert!(recommendations[0].contains("paying off"));
    }

    #[test]
    fn test_recommendations_flag_heavy_physical_usage() {
        let metrics = SavingsSummary {
            period: SavingsPeriod::Quarter,
            physical_compute_hours: 150.0,
            virtual_compute_hours: 150.0,
            cost: 375.0,
            saved_cost: 375.0,
            potential_cost: 750.0,
            savings_percentage: 50.0,
        };
        let recommendations = CostTracker::generate_recommendations(&metrics);
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[0].contains("physical compute hours"));
    }
}
