//! Cost ledger persistence
//!
//! The ledger is append-only: writers push execution records, readers load
//! the full document and filter in memory. I/O errors always propagate so
//! accounting data is never silently lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::PipeformError;
use crate::filesys::file::File;

/// One accounted unit of compute.
///
/// Exactly one of `physical_compute_hours`/`virtual_compute_hours` is
/// non-zero per record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub is_virtual: bool,
    pub physical_compute_hours: f64,
    pub virtual_compute_hours: f64,
    pub cost: f64,
    pub saved_cost: f64,
}

/// Running totals maintained alongside the raw records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAggregates {
    pub total_executions: u64,
    pub total_physical_compute_hours: f64,
    pub total_virtual_compute_hours: f64,
    pub total_cost: f64,
    pub total_saved_cost: f64,
}

/// On-disk ledger document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    pub executions: Vec<ExecutionRecord>,
    pub aggregates: LedgerAggregates,
    pub created_at: DateTime<Utc>,
}

impl LedgerDocument {
    fn empty() -> Self {
        Self {
            executions: Vec::new(),
            aggregates: LedgerAggregates::default(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only execution log backed by a JSON file
pub struct CostLedger {
    file: File,
    write_lock: Mutex<()>,
}

impl CostLedger {
    pub fn new(file: File) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one execution record, updating the running aggregates
    pub async fn append(&self, record: ExecutionRecord) -> Result<(), PipeformError> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.load().await?;
        document.aggregates.total_executions += 1;
        document.aggregates.total_physical_compute_hours += record.physical_compute_hours;
        document.aggregates.total_virtual_compute_hours += record.virtual_compute_hours;
        document.aggregates.total_cost += record.cost;
        document.aggregates.total_saved_cost += record.saved_cost;
        document.executions.push(record);

        self.file.write_json_atomic(&document).await
    }

    /// Load the full ledger document; an absent file is an empty ledger
    pub async fn load(&self) -> Result<LedgerDocument, PipeformError> {
        self.file.read_json_or(LedgerDocument::empty).await
    }

    /// All execution records, oldest first
    pub async fn records(&self) -> Result<Vec<ExecutionRecord>, PipeformError> {
        Ok(self.load().await?.executions)
    }
}
