//! Normalized invoice records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One normalized invoice, traced to the PDF it was extracted from.
///
/// Every field except `source_file` has a fixed default, so a record built
/// from an empty or failed extraction is still complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// File name of the source PDF, relative to the input directory.
    pub source_file: String,

    /// Outcome of extraction and normalization.
    pub status: RecordStatus,

    /// Gateway error message for failed extractions.
    #[serde(default)]
    pub error: String,

    /// Issuer (supplier) CIF/NIF.
    #[serde(default)]
    pub issuer_tax_id: String,

    /// Issuer (supplier) name.
    #[serde(default)]
    pub issuer_name: String,

    /// Recipient (client) CIF/NIF.
    #[serde(default)]
    pub recipient_tax_id: String,

    /// Recipient (client) name.
    #[serde(default)]
    pub recipient_name: String,

    /// Invoice number as printed.
    #[serde(default)]
    pub invoice_number: String,

    /// Date the invoice was issued.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,

    /// Taxable base (base imponible).
    #[serde(default)]
    pub taxable_base: Decimal,

    /// VAT amount (IVA).
    #[serde(default)]
    pub vat_amount: Decimal,

    /// Income tax withholding (retención IRPF).
    #[serde(default)]
    pub irpf_withholding: Decimal,

    /// Invoice total.
    #[serde(default)]
    pub total: Decimal,

    /// ISO 4217 currency code, upper-case.
    #[serde(default)]
    pub currency: String,

    /// IBAN without spaces.
    #[serde(default)]
    pub iban: String,

    /// Payment method as stated on the invoice.
    #[serde(default)]
    pub payment_method: String,

    /// Line items in document order.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A single line item on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product/service description.
    #[serde(default)]
    pub description: String,

    /// Quantity.
    #[serde(default)]
    pub quantity: Decimal,

    /// Unit price.
    #[serde(default)]
    pub unit_price: Decimal,

    /// Total for this line.
    #[serde(default)]
    pub line_total: Decimal,
}

/// How a record came to be.
///
/// Ordered by severity: `Ok < Warnings < Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Extracted and normalized cleanly.
    #[default]
    Ok,
    /// Normalized, but some fields were coerced or defaulted.
    Warnings,
    /// Extraction failed; all invoice fields hold defaults.
    Failed,
}

impl RecordStatus {
    /// Lower-case label used in exports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ok => "ok",
            RecordStatus::Warnings => "warnings",
            RecordStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InvoiceRecord {
    /// Create a record holding only defaults for the given source file.
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            status: RecordStatus::Ok,
            error: String::new(),
            issuer_tax_id: String::new(),
            issuer_name: String::new(),
            recipient_tax_id: String::new(),
            recipient_name: String::new(),
            invoice_number: String::new(),
            issue_date: None,
            taxable_base: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            irpf_withholding: Decimal::ZERO,
            total: Decimal::ZERO,
            currency: String::new(),
            iban: String::new(),
            payment_method: String::new(),
            line_items: Vec::new(),
        }
    }

    /// Create the error marker for a file whose extraction failed.
    pub fn failed(source_file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Failed,
            error: error.into(),
            ..Self::new(source_file)
        }
    }

    /// Issue date in ISO format, or an empty string.
    pub fn issue_date_iso(&self) -> String {
        self.issue_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    /// Check whether any invoice-level financial data is present.
    pub fn has_financials(&self) -> bool {
        !self.total.is_zero()
            || !self.taxable_base.is_zero()
            || !self.vat_amount.is_zero()
            || !self.line_items.is_empty()
    }

    /// Sum of line totals.
    pub fn line_items_total(&self) -> Decimal {
        self.line_items.iter().map(|i| i.line_total).sum()
    }
}
