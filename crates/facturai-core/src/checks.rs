//! Cross-record consistency checks over a finished batch.
//!
//! Issues are reported, never applied: records are not modified or dropped,
//! so every input file stays traceable in the export.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::models::invoice::{InvoiceRecord, RecordStatus};

/// A problem spanning several records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchIssue {
    /// The same company name appears with different tax ids.
    TaxIdMismatch {
        company: String,
        expected: String,
        found: String,
        source_file: String,
    },
    /// Two records share issuer tax id and invoice number.
    DuplicateInvoice {
        issuer_tax_id: String,
        invoice_number: String,
        first_file: String,
        duplicate_file: String,
    },
}

impl std::fmt::Display for BatchIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchIssue::TaxIdMismatch {
                company,
                expected,
                found,
                source_file,
            } => write!(
                f,
                "{}: company '{}' has tax id '{}', previously seen as '{}'",
                source_file, company, found, expected
            ),
            BatchIssue::DuplicateInvoice {
                issuer_tax_id,
                invoice_number,
                first_file,
                duplicate_file,
            } => write!(
                f,
                "{}: invoice {} from {} already extracted from {}",
                duplicate_file, invoice_number, issuer_tax_id, first_file
            ),
        }
    }
}

/// Tracks the tax id first seen for each company name.
#[derive(Debug, Default)]
pub struct TaxIdConsistency {
    known: HashMap<String, String>,
}

impl TaxIdConsistency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check issuer and recipient of one record against earlier records.
    pub fn check(&mut self, record: &InvoiceRecord) -> Vec<BatchIssue> {
        let mut issues = Vec::new();
        for (name, tax_id) in [
            (&record.issuer_name, &record.issuer_tax_id),
            (&record.recipient_name, &record.recipient_tax_id),
        ] {
            if let Some(issue) = self.check_company(name, tax_id, &record.source_file) {
                issues.push(issue);
            }
        }
        issues
    }

    fn check_company(&mut self, name: &str, tax_id: &str, source_file: &str) -> Option<BatchIssue> {
        if name.is_empty() || tax_id.is_empty() {
            return None;
        }

        let tax_id = normalize_tax_id(tax_id);
        match self.known.entry(name.to_lowercase()) {
            Entry::Vacant(slot) => {
                slot.insert(tax_id);
                None
            }
            Entry::Occupied(slot) if *slot.get() != tax_id => Some(BatchIssue::TaxIdMismatch {
                company: name.to_string(),
                expected: slot.get().clone(),
                found: tax_id,
                source_file: source_file.to_string(),
            }),
            Entry::Occupied(_) => None,
        }
    }
}

/// Finds records describing an invoice already seen in the batch.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen: HashMap<(String, String), String>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, record: &InvoiceRecord) -> Option<BatchIssue> {
        if record.issuer_tax_id.is_empty() || record.invoice_number.is_empty() {
            return None;
        }

        let key = (
            normalize_tax_id(&record.issuer_tax_id),
            record.invoice_number.trim().to_uppercase(),
        );
        match self.seen.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record.source_file.clone());
                None
            }
            Entry::Occupied(slot) => Some(BatchIssue::DuplicateInvoice {
                issuer_tax_id: record.issuer_tax_id.clone(),
                invoice_number: record.invoice_number.clone(),
                first_file: slot.get().clone(),
                duplicate_file: record.source_file.clone(),
            }),
        }
    }
}

/// Run every batch check over records in export order.
///
/// Failed records carry no data and are skipped.
pub fn check_batch(records: &[InvoiceRecord]) -> Vec<BatchIssue> {
    let mut tax_ids = TaxIdConsistency::new();
    let mut duplicates = DuplicateDetector::new();
    let mut issues = Vec::new();

    for record in records.iter().filter(|r| r.status != RecordStatus::Failed) {
        issues.extend(tax_ids.check(record));
        issues.extend(duplicates.check(record));
    }
    issues
}

// "b-1234567 8" and "B12345678" are the same CIF
fn normalize_tax_id(tax_id: &str) -> String {
    tax_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}
