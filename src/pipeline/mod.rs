// Card pipeline: ingestion, processing, reconciliation, batch fan-out, and storage

pub mod batch;
pub mod ingestion;
pub mod metrics;
pub mod processing;
pub mod reconcile;
pub mod storage;

pub use batch::{BatchRunner, BatchSummary, RecordFailure, Stage, WrittenCard};
pub use reconcile::{Reconciler, ReconcileReport, Rejection};
