//! Batch metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use super::batch::Stage;

pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_written(duration_secs: f64) {
        ::metrics::counter!("porter_records_processed_total").increment(1);
        ::metrics::histogram!("porter_record_duration_seconds").record(duration_secs);
    }

    pub fn record_rejected(violations: usize) {
        ::metrics::counter!("porter_records_rejected_total").increment(1);
        ::metrics::histogram!("porter_rejection_violations").record(violations as f64);
    }

    pub fn record_failed(stage: Stage) {
        ::metrics::counter!("porter_records_failed_total", "stage" => stage.as_str()).increment(1);
    }

    pub fn record_enriched(fields: usize) {
        if fields > 0 {
            ::metrics::counter!("porter_library_fills_total").increment(fields as u64);
        }
    }
}
