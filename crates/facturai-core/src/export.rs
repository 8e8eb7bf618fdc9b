//! Batch export of normalized records to a timestamped file.
//!
//! CSV exports are flattened to one row per line item with the invoice
//! fields repeated on each row. A record without line items still gets one
//! row, with the item columns left empty, so every source file appears in
//! the export.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ExportError;
use crate::models::config::ExportConfig;
use crate::models::invoice::{InvoiceRecord, LineItem};

/// Fixed CSV header.
pub const COLUMNS: [&str; 21] = [
    "source_file",
    "status",
    "error",
    "issuer_tax_id",
    "issuer_name",
    "recipient_tax_id",
    "recipient_name",
    "invoice_number",
    "issue_date",
    "taxable_base",
    "vat_amount",
    "irpf_withholding",
    "total",
    "currency",
    "iban",
    "payment_method",
    "line_no",
    "item_description",
    "item_quantity",
    "item_unit_price",
    "item_line_total",
];

/// Export file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Flat CSV, one row per line item.
    #[default]
    Csv,
    /// Pretty-printed JSON array of records.
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Writes a batch of records under an output directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    format: ExportFormat,
    file_prefix: String,
}

impl Exporter {
    /// Create an exporter for the given format.
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            file_prefix: "invoices".to_string(),
        }
    }

    /// Create an exporter from configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.format).with_prefix(&config.file_prefix)
    }

    /// Set the file name prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.file_prefix = prefix.to_string();
        self
    }

    /// Write `records` to a new file in `output_dir`, named after `started_at`.
    ///
    /// The directory is created if needed. An existing file is never
    /// overwritten: a numeric suffix is added instead.
    pub fn export<Tz>(
        &self,
        records: &[InvoiceRecord],
        output_dir: &Path,
        started_at: &DateTime<Tz>,
    ) -> Result<PathBuf, ExportError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        fs::create_dir_all(output_dir).map_err(|source| ExportError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let stem = format!("{}_{}", self.file_prefix, started_at.format("%Y%m%d_%H%M%S"));
        let (path, file) = create_unique(output_dir, &stem, self.format.extension())?;
        debug!("Writing {} records to {}", records.len(), path.display());

        let mut writer = BufWriter::new(file);
        match self.format {
            ExportFormat::Csv => write_csv(records, &mut writer)?,
            ExportFormat::Json => write_json(records, &mut writer)?,
        }
        writer.flush()?;

        info!("Exported {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

fn create_unique(dir: &Path, stem: &str, extension: &str) -> Result<(PathBuf, File), ExportError> {
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}_{}.{}", stem, suffix, extension)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write records as flattened CSV, header included.
pub fn write_csv<W: Write>(records: &[InvoiceRecord], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS)?;

    for record in records {
        if record.line_items.is_empty() {
            wtr.write_record(row(record, None))?;
        }
        for (i, item) in record.line_items.iter().enumerate() {
            wtr.write_record(row(record, Some((i + 1, item))))?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn row(record: &InvoiceRecord, item: Option<(usize, &LineItem)>) -> [String; 21] {
    let (line_no, description, quantity, unit_price, line_total) = match item {
        Some((n, item)) => (
            n.to_string(),
            item.description.clone(),
            item.quantity.to_string(),
            item.unit_price.to_string(),
            item.line_total.to_string(),
        ),
        None => Default::default(),
    };

    [
        record.source_file.clone(),
        record.status.to_string(),
        record.error.clone(),
        record.issuer_tax_id.clone(),
        record.issuer_name.clone(),
        record.recipient_tax_id.clone(),
        record.recipient_name.clone(),
        record.invoice_number.clone(),
        record.issue_date_iso(),
        record.taxable_base.to_string(),
        record.vat_amount.to_string(),
        record.irpf_withholding.to_string(),
        record.total.to_string(),
        record.currency.clone(),
        record.iban.clone(),
        record.payment_method.clone(),
        line_no,
        description,
        quantity,
        unit_price,
        line_total,
    ]
}

/// Write records as a pretty-printed JSON array.
pub fn write_json<W: Write>(records: &[InvoiceRecord], writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}
