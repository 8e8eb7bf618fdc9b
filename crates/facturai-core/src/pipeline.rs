//! Batch driver: extract, normalize and check every enumerated invoice.

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::checks::{BatchIssue, check_batch};
use crate::gateway::ExtractionGateway;
use crate::models::invoice::{InvoiceRecord, RecordStatus};
use crate::normalize::Normalizer;
use crate::request::ExtractionRequest;

/// Per-status record counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub ok: usize,
    pub with_warnings: usize,
    pub failed: usize,
}

impl BatchStats {
    /// Count records by status.
    pub fn from_records(records: &[InvoiceRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                RecordStatus::Ok => stats.ok += 1,
                RecordStatus::Warnings => stats.with_warnings += 1,
                RecordStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Everything a run produced, in enumeration order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub records: Vec<InvoiceRecord>,
    pub issues: Vec<BatchIssue>,
    pub stats: BatchStats,
}

/// Runs requests through a gateway and the normalizer.
///
/// A failing file never aborts the batch: its gateway error is recorded on a
/// `failed` record and the run moves on.
pub struct Pipeline {
    gateway: Box<dyn ExtractionGateway>,
    normalizer: Normalizer,
    jobs: usize,
}

impl Pipeline {
    /// Create a pipeline processing one file at a time.
    pub fn new(gateway: Box<dyn ExtractionGateway>, normalizer: Normalizer) -> Self {
        Self {
            gateway,
            normalizer,
            jobs: 1,
        }
    }

    /// Allow up to `jobs` extractions in flight. Output order is unaffected.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Process `requests`, calling `on_progress` as each record completes.
    ///
    /// Records come back in request order, one per request.
    pub async fn run<F>(&self, requests: Vec<ExtractionRequest>, mut on_progress: F) -> BatchOutcome
    where
        F: FnMut(&InvoiceRecord),
    {
        info!(
            "Processing {} invoices with {} gateway ({} jobs)",
            requests.len(),
            self.gateway.name(),
            self.jobs
        );

        let mut records = Vec::with_capacity(requests.len());
        let mut results = stream::iter(requests.into_iter().map(|request| self.process(request)))
            .buffered(self.jobs);

        while let Some(record) = results.next().await {
            on_progress(&record);
            records.push(record);
        }

        let issues = check_batch(&records);
        for issue in &issues {
            warn!("{}", issue);
        }

        let stats = BatchStats::from_records(&records);
        info!(
            "Batch done: {} ok, {} with warnings, {} failed",
            stats.ok, stats.with_warnings, stats.failed
        );

        BatchOutcome {
            records,
            issues,
            stats,
        }
    }

    async fn process(&self, request: ExtractionRequest) -> InvoiceRecord {
        debug!("Extracting {}", request.source_file);

        let raw = match self.gateway.extract(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Extraction failed for {}: {}", request.source_file, e);
                return InvoiceRecord::failed(request.source_file, e.to_string());
            }
        };

        let normalized = self.normalizer.normalize(&raw, &request.source_file);
        for warning in &normalized.warnings {
            warn!("{}: {}", request.source_file, warning);
        }

        let record = normalized.record;
        if !record.line_items.is_empty()
            && !record.taxable_base.is_zero()
            && record.line_items_total() != record.taxable_base
        {
            debug!(
                "{}: line items sum to {}, taxable base is {}",
                record.source_file,
                record.line_items_total(),
                record.taxable_base
            );
        }
        record
    }
}
