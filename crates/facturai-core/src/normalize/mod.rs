//! Record normalization: turn a raw extraction into an [`InvoiceRecord`].
//!
//! The normalizer never fails. Anything it cannot use is replaced by the
//! field default and reported as a [`NormalizeWarning`]; the caller decides
//! whether to log or collect them.

pub mod amounts;
pub mod dates;
pub mod iban;

pub use amounts::{DecimalConvention, parse_amount};
pub use dates::parse_date;
pub use iban::{compact_iban, validate_iban};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::models::config::NormalizeConfig;
use crate::models::invoice::{InvoiceRecord, LineItem, RecordStatus};
use crate::models::raw::RawExtractionResponse;

type Object = Map<String, Value>;

// Canonical key first, then the Spanish labels the service has historically used
const ISSUER_TAX_ID: &[&str] = &["issuer_tax_id", "CIF/ NIF Proveedor", "provider_cif"];
const ISSUER_NAME: &[&str] = &["issuer_name", "Nombre Proveedor", "provider_name"];
const RECIPIENT_TAX_ID: &[&str] = &["recipient_tax_id", "CIF/ NIF Cliente", "client_cif"];
const RECIPIENT_NAME: &[&str] = &["recipient_name", "Nombre Cliente", "client_name"];
const INVOICE_NUMBER: &[&str] = &["invoice_number", "Numero de Factura", "Número de Factura"];
const ISSUE_DATE: &[&str] = &["issue_date", "Fecha de la factura", "invoice_date"];
const TAXABLE_BASE: &[&str] = &["taxable_base", "Base imponible", "base_imponible"];
const VAT_AMOUNT: &[&str] = &["vat_amount", "IVA", "iva"];
const IRPF: &[&str] = &["irpf_withholding", "Retencion IRPF", "Retención IRPF", "retencion_irpf"];
const TOTAL: &[&str] = &["total", "TOTAL"];
const CURRENCY: &[&str] = &["currency", "Moneda"];
const IBAN: &[&str] = &["iban", "IBAN"];
const PAYMENT_METHOD: &[&str] = &["payment_method", "Forma de pago"];
const LINE_ITEMS: &[&str] = &["line_items", "Lineas", "items"];
const STATUS: &str = "status";
const ERROR: &[&str] = &["error"];

const ITEM_DESCRIPTION: &[&str] = &["description", "Descripcion", "concepto"];
const ITEM_QUANTITY: &[&str] = &["quantity", "Cantidad"];
const ITEM_UNIT_PRICE: &[&str] = &["unit_price", "Precio unitario", "price"];
const ITEM_LINE_TOTAL: &[&str] = &["line_total", "Importe", "amount", "total"];

/// What was wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The response is not an object (or an array of objects).
    NotAnObject,
    /// The response held several invoices; only the first was used.
    ExtraInvoicesIgnored,
    /// The value has a JSON type the field cannot hold.
    UnexpectedType,
    /// The value could not be read as an amount.
    UnparseableAmount,
    /// The value could not be read as a date.
    UnparseableDate,
    /// The value is not a three-letter currency code.
    UnknownCurrency,
    /// The IBAN checksum does not match.
    InvalidIban,
}

impl WarningKind {
    /// Stable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            WarningKind::NotAnObject => "not_an_object",
            WarningKind::ExtraInvoicesIgnored => "extra_invoices_ignored",
            WarningKind::UnexpectedType => "unexpected_type",
            WarningKind::UnparseableAmount => "unparseable_amount",
            WarningKind::UnparseableDate => "unparseable_date",
            WarningKind::UnknownCurrency => "unknown_currency",
            WarningKind::InvalidIban => "invalid_iban",
        }
    }
}

/// A field that was coerced or defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeWarning {
    /// Record field, e.g. `total` or `line_items[1].quantity`.
    pub field: String,
    /// Warning code.
    pub kind: WarningKind,
    /// Offending raw value, rendered as JSON.
    pub value: String,
}

impl NormalizeWarning {
    fn new(field: impl Into<String>, kind: WarningKind, value: &Value) -> Self {
        Self {
            field: field.into(),
            kind,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.kind.code(), self.value)
    }
}

/// A record and the warnings raised while building it.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: InvoiceRecord,
    pub warnings: Vec<NormalizeWarning>,
}

/// Maps raw extraction responses onto the fixed record schema.
#[derive(Debug, Clone)]
pub struct Normalizer {
    convention: DecimalConvention,
    default_currency: String,
    validate_iban: bool,
}

impl Normalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self::from_config(&NormalizeConfig::default())
    }

    /// Create a normalizer from configuration.
    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self {
            convention: config.decimal_convention,
            default_currency: config.default_currency.trim().to_uppercase(),
            validate_iban: config.validate_iban,
        }
    }

    /// Set the decimal convention for textual amounts.
    pub fn with_convention(mut self, convention: DecimalConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Set the currency used when none is found.
    pub fn with_default_currency(mut self, currency: &str) -> Self {
        self.default_currency = currency.trim().to_uppercase();
        self
    }

    /// Set IBAN checksum validation.
    pub fn with_iban_validation(mut self, validate: bool) -> Self {
        self.validate_iban = validate;
        self
    }

    /// Build the record for `source_file` from a raw response.
    pub fn normalize(&self, raw: &RawExtractionResponse, source_file: &str) -> Normalized {
        let mut ctx = Context {
            convention: self.convention,
            warnings: Vec::new(),
            currency_hint: None,
        };
        let mut record = InvoiceRecord::new(source_file);

        let Some(obj) = ctx.select_invoice(raw.value()) else {
            record.status = status_for(&ctx.warnings);
            return Normalized {
                record,
                warnings: ctx.warnings,
            };
        };

        record.issuer_tax_id = ctx.text(obj, ISSUER_TAX_ID);
        record.issuer_name = ctx.text(obj, ISSUER_NAME);
        record.recipient_tax_id = ctx.text(obj, RECIPIENT_TAX_ID);
        record.recipient_name = ctx.text(obj, RECIPIENT_NAME);
        record.invoice_number = ctx.text(obj, INVOICE_NUMBER);
        record.issue_date = ctx.date(obj, ISSUE_DATE);
        record.taxable_base = ctx.amount(obj, TAXABLE_BASE);
        record.vat_amount = ctx.amount(obj, VAT_AMOUNT);
        record.irpf_withholding = ctx.amount(obj, IRPF);
        record.total = ctx.amount(obj, TOTAL);
        record.currency = ctx.currency(obj, &self.default_currency);
        record.iban = compact_iban(&ctx.text(obj, IBAN));
        record.payment_method = ctx.text(obj, PAYMENT_METHOD);
        record.line_items = ctx.line_items(obj);
        record.error = ctx.text(obj, ERROR);

        if self.validate_iban && !record.iban.is_empty() && !validate_iban(&record.iban) {
            ctx.warnings.push(NormalizeWarning::new(
                IBAN[0],
                WarningKind::InvalidIban,
                &Value::String(record.iban.clone()),
            ));
        }

        // A record fed back in keeps its status; new warnings can only raise it
        record.status = status_for(&ctx.warnings).max(carried_status(obj));
        Normalized {
            record,
            warnings: ctx.warnings,
        }
    }
}

fn carried_status(obj: &Object) -> RecordStatus {
    obj.get(STATUS)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn status_for(warnings: &[NormalizeWarning]) -> RecordStatus {
    if warnings.is_empty() {
        RecordStatus::Ok
    } else {
        RecordStatus::Warnings
    }
}

/// State for one normalization pass.
struct Context {
    convention: DecimalConvention,
    warnings: Vec<NormalizeWarning>,
    currency_hint: Option<&'static str>,
}

impl Context {
    fn warn(&mut self, field: impl Into<String>, kind: WarningKind, value: &Value) {
        self.warnings.push(NormalizeWarning::new(field, kind, value));
    }

    fn select_invoice<'a>(&mut self, value: &'a Value) -> Option<&'a Object> {
        match value {
            Value::Object(obj) => Some(obj),
            Value::Array(items) => {
                let first = items.first().and_then(Value::as_object);
                if first.is_none() {
                    self.warn("$", WarningKind::NotAnObject, value);
                } else if items.len() > 1 {
                    self.warn(
                        "$",
                        WarningKind::ExtraInvoicesIgnored,
                        &Value::from(items.len()),
                    );
                }
                first
            }
            other => {
                self.warn("$", WarningKind::NotAnObject, other);
                None
            }
        }
    }

    fn text(&mut self, obj: &Object, keys: &[&str]) -> String {
        self.text_at(obj, keys, keys[0].to_string())
    }

    fn text_at(&mut self, obj: &Object, keys: &[&str], field: String) -> String {
        match lookup(obj, keys) {
            None => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                self.warn(field, WarningKind::UnexpectedType, other);
                String::new()
            }
        }
    }

    fn amount(&mut self, obj: &Object, keys: &[&str]) -> Decimal {
        self.amount_at(obj, keys, keys[0].to_string())
    }

    fn amount_at(&mut self, obj: &Object, keys: &[&str], field: String) -> Decimal {
        let Some(value) = lookup(obj, keys) else {
            return Decimal::ZERO;
        };

        let parsed = match value {
            Value::Number(n) => amounts::amount_from_number(n),
            Value::String(s) if s.trim().is_empty() => return Decimal::ZERO,
            Value::String(s) => {
                if self.currency_hint.is_none() {
                    self.currency_hint = amounts::currency_from_symbol(s);
                }
                parse_amount(s, self.convention)
            }
            other => {
                self.warn(field, WarningKind::UnexpectedType, other);
                return Decimal::ZERO;
            }
        };

        parsed.unwrap_or_else(|| {
            self.warn(field, WarningKind::UnparseableAmount, value);
            Decimal::ZERO
        })
    }

    fn date(&mut self, obj: &Object, keys: &[&str]) -> Option<NaiveDate> {
        match lookup(obj, keys)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => {
                let date = parse_date(s);
                if date.is_none() {
                    self.warn(keys[0], WarningKind::UnparseableDate, &Value::String(s.clone()));
                }
                date
            }
            other => {
                self.warn(keys[0], WarningKind::UnexpectedType, other);
                None
            }
        }
    }

    fn currency(&mut self, obj: &Object, default: &str) -> String {
        let raw = self.text(obj, CURRENCY);

        if raw.is_empty() {
            return self
                .currency_hint
                .map(str::to_string)
                .unwrap_or_else(|| default.to_string());
        }

        if let Some(code) = amounts::currency_from_symbol(&raw) {
            return code.to_string();
        }

        let code = raw.to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            self.warn(CURRENCY[0], WarningKind::UnknownCurrency, &Value::String(raw));
        }
        code
    }

    fn line_items(&mut self, obj: &Object) -> Vec<LineItem> {
        let items = match lookup(obj, LINE_ITEMS) {
            None => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.warn(LINE_ITEMS[0], WarningKind::UnexpectedType, other);
                return Vec::new();
            }
        };

        let mut result = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let prefix = format!("{}[{}]", LINE_ITEMS[0], i);
            let Some(item) = item.as_object() else {
                self.warn(prefix, WarningKind::UnexpectedType, item);
                continue;
            };

            result.push(LineItem {
                description: self.text_at(item, ITEM_DESCRIPTION, format!("{prefix}.description")),
                quantity: self.amount_at(item, ITEM_QUANTITY, format!("{prefix}.quantity")),
                unit_price: self.amount_at(item, ITEM_UNIT_PRICE, format!("{prefix}.unit_price")),
                line_total: self.amount_at(item, ITEM_LINE_TOTAL, format!("{prefix}.line_total")),
            });
        }
        result
    }
}

/// First non-null value stored under any of `keys`.
///
/// Exact matches win; otherwise keys are compared ignoring case and
/// surrounding whitespace.
fn lookup<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        if let Some(value) = obj.get(*key).filter(|v| !v.is_null()) {
            return Some(value);
        }
    }

    obj.iter()
        .filter(|(_, v)| !v.is_null())
        .find(|(k, _)| {
            let k = k.trim();
            keys.iter().any(|key| k.eq_ignore_ascii_case(key))
        })
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn normalize(value: Value) -> Normalized {
        Normalizer::new().normalize(&RawExtractionResponse::new(value), "a.pdf")
    }

    fn kinds(normalized: &Normalized) -> Vec<(&str, WarningKind)> {
        normalized
            .warnings
            .iter()
            .map(|w| (w.field.as_str(), w.kind))
            .collect()
    }

    #[test]
    fn test_spanish_labelled_response() {
        let normalized = normalize(json!([{
            "CIF/ NIF Proveedor": "B12345678",
            "Nombre Proveedor": "Ejemplo S.L.",
            "CIF/ NIF Cliente": "A87654321",
            "Nombre Cliente": "Cliente Ficticio S.A.",
            "Numero de Factura": "INV-2023-001",
            "Fecha de la factura": "2023-10-26",
            "Base imponible": 100.00,
            "IVA": 21.00,
            "Retencion IRPF": 0.00,
            "TOTAL": 121.00,
            "IBAN": "ES91 2100 0418 4502 0005 1332",
            "Forma de pago": "Transferencia"
        }]));

        let record = &normalized.record;
        assert!(normalized.warnings.is_empty(), "{:?}", normalized.warnings);
        assert_eq!(record.status, RecordStatus::Ok);
        assert_eq!(record.source_file, "a.pdf");
        assert_eq!(record.issuer_tax_id, "B12345678");
        assert_eq!(record.issuer_name, "Ejemplo S.L.");
        assert_eq!(record.recipient_tax_id, "A87654321");
        assert_eq!(record.recipient_name, "Cliente Ficticio S.A.");
        assert_eq!(record.invoice_number, "INV-2023-001");
        assert_eq!(record.issue_date_iso(), "2023-10-26");
        assert_eq!(record.taxable_base, dec("100"));
        assert_eq!(record.vat_amount, dec("21"));
        assert_eq!(record.irpf_withholding, Decimal::ZERO);
        assert_eq!(record.total, dec("121"));
        assert_eq!(record.iban, "ES9121000418450200051332");
        assert_eq!(record.payment_method, "Transferencia");
        assert_eq!(record.currency, "");
    }

    #[test]
    fn test_missing_fields_take_defaults_silently() {
        let normalized = normalize(json!({"invoice_number": "F-1", "total": null}));
        assert!(normalized.warnings.is_empty());
        assert_eq!(normalized.record.status, RecordStatus::Ok);
        assert_eq!(normalized.record.total, Decimal::ZERO);
        assert_eq!(normalized.record.currency, "");
        assert!(normalized.record.line_items.is_empty());
        assert_eq!(normalized.record.issue_date, None);
    }

    #[test]
    fn test_currency_symbol_in_total() {
        let normalized = normalize(json!({"total": "1.234,56 €"}));
        assert_eq!(normalized.record.total, dec("1234.56"));
        assert_eq!(normalized.record.currency, "EUR");
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_default_currency() {
        let normalizer = Normalizer::new().with_default_currency("eur");
        let normalized = normalizer.normalize(&RawExtractionResponse::new(json!({})), "a.pdf");
        assert_eq!(normalized.record.currency, "EUR");

        let normalized = normalizer.normalize(
            &RawExtractionResponse::new(json!({"currency": "usd"})),
            "a.pdf",
        );
        assert_eq!(normalized.record.currency, "USD");
    }

    #[test]
    fn test_malformed_fields_warn_and_default() {
        let normalized = normalize(json!({
            "total": "about a hundred",
            "issue_date": "last tuesday",
            "issuer_name": {"nested": true},
            "vat_amount": true,
            "currency": "euros",
            "line_items": "none"
        }));

        let record = &normalized.record;
        assert_eq!(record.status, RecordStatus::Warnings);
        assert_eq!(record.total, Decimal::ZERO);
        assert_eq!(record.issue_date, None);
        assert_eq!(record.issuer_name, "");
        assert_eq!(record.vat_amount, Decimal::ZERO);
        assert!(record.line_items.is_empty());

        let kinds = kinds(&normalized);
        assert!(kinds.contains(&("total", WarningKind::UnparseableAmount)));
        assert!(kinds.contains(&("issue_date", WarningKind::UnparseableDate)));
        assert!(kinds.contains(&("issuer_name", WarningKind::UnexpectedType)));
        assert!(kinds.contains(&("vat_amount", WarningKind::UnexpectedType)));
        assert!(kinds.contains(&("currency", WarningKind::UnknownCurrency)));
        assert!(kinds.contains(&("line_items", WarningKind::UnexpectedType)));
    }

    #[test]
    fn test_non_object_responses() {
        for value in [json!(null), json!("text"), json!([]), json!([1, 2])] {
            let normalized = normalize(value);
            assert_eq!(normalized.record.status, RecordStatus::Warnings);
            assert_eq!(kinds(&normalized), vec![("$", WarningKind::NotAnObject)]);
            assert_eq!(normalized.record.source_file, "a.pdf");
        }
    }

    #[test]
    fn test_extra_invoices_are_reported() {
        let normalized = normalize(json!([{"invoice_number": "A"}, {"invoice_number": "B"}]));
        assert_eq!(normalized.record.invoice_number, "A");
        assert_eq!(kinds(&normalized), vec![("$", WarningKind::ExtraInvoicesIgnored)]);
    }

    #[test]
    fn test_line_items() {
        let normalized = normalize(json!({
            "line_items": [
                {"description": "Consultoría", "quantity": 2, "unit_price": "50,00", "line_total": 100},
                "garbage",
                {"description": "Soporte", "quantity": "x", "unit_price": 21.5, "line_total": 21.5}
            ]
        }));

        let items = &normalized.record.line_items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Consultoría");
        assert_eq!(items[0].quantity, dec("2"));
        assert_eq!(items[0].unit_price, dec("50.00"));
        assert_eq!(items[0].line_total, dec("100"));
        assert_eq!(items[1].quantity, Decimal::ZERO);
        assert_eq!(items[1].unit_price, dec("21.5"));

        assert_eq!(
            kinds(&normalized),
            vec![
                ("line_items[1]", WarningKind::UnexpectedType),
                ("line_items[2].quantity", WarningKind::UnparseableAmount),
            ]
        );
    }

    #[test]
    fn test_invalid_iban_is_kept_with_warning() {
        let normalized = normalize(json!({"iban": "ES12 3456 7890 1234 5678 9012"}));
        assert_eq!(normalized.record.iban, "ES1234567890123456789012");
        assert_eq!(kinds(&normalized), vec![("iban", WarningKind::InvalidIban)]);

        let lenient = Normalizer::new().with_iban_validation(false).normalize(
            &RawExtractionResponse::new(json!({"iban": "ES1234567890123456789012"})),
            "a.pdf",
        );
        assert!(lenient.warnings.is_empty());
    }

    #[test]
    fn test_keys_match_ignoring_case() {
        let normalized = normalize(json!({" Total ": 5, "Invoice_Number": "X"}));
        assert_eq!(normalized.record.total, dec("5"));
        assert_eq!(normalized.record.invoice_number, "X");
    }

    #[test]
    fn test_comma_convention() {
        let normalizer = Normalizer::new().with_convention(DecimalConvention::CommaDecimal);
        let normalized =
            normalizer.normalize(&RawExtractionResponse::new(json!({"total": "1.500"})), "a.pdf");
        assert_eq!(normalized.record.total, dec("1500"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize(json!({
            "Nombre Proveedor": "  Ejemplo S.L. ",
            "Fecha de la factura": "26/10/2023",
            "TOTAL": "150,00 €",
            "IBAN": "es91 2100 0418 4502 0005 1332",
            "line_items": [{"description": "A", "quantity": 1, "unit_price": "150", "line_total": "150.00"}]
        }))
        .record;

        let raw = RawExtractionResponse::from_record(&first).unwrap();
        let second = Normalizer::new().normalize(&raw, &first.source_file);

        assert!(second.warnings.is_empty());
        assert_eq!(second.record, first);
    }

    #[test]
    fn test_warnings_status_survives_renormalization() {
        let first = normalize(json!({"total": "about a hundred", "invoice_number": "F-7"})).record;
        assert_eq!(first.status, RecordStatus::Warnings);

        let raw = RawExtractionResponse::from_record(&first).unwrap();
        let second = Normalizer::new().normalize(&raw, &first.source_file);

        assert!(second.warnings.is_empty());
        assert_eq!(second.record, first);
    }

    #[test]
    fn test_failed_record_survives_renormalization() {
        let failed = InvoiceRecord::failed("a.pdf", "request timed out after 120s");

        let raw = RawExtractionResponse::from_record(&failed).unwrap();
        let again = Normalizer::new().normalize(&raw, "a.pdf").record;

        assert_eq!(again, failed);
    }

    #[test]
    fn test_unknown_status_value_is_ignored() {
        let normalized = normalize(json!({"status": "paid", "total": 10}));
        assert_eq!(normalized.record.status, RecordStatus::Ok);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_comma_convention_is_idempotent() {
        let normalizer = Normalizer::new().with_convention(DecimalConvention::CommaDecimal);
        let first = normalizer
            .normalize(
                &RawExtractionResponse::new(json!({
                    "total": "1,234",
                    "vat_amount": "0.500",
                    "line_items": [{"description": "A", "quantity": "0,500", "line_total": "1.234,56"}]
                })),
                "a.pdf",
            )
            .record;
        assert_eq!(first.total, dec("1.234"));
        assert_eq!(first.vat_amount, dec("0.500"));
        assert_eq!(first.line_items[0].quantity, dec("0.500"));
        assert_eq!(first.line_items[0].line_total, dec("1234.56"));

        let raw = RawExtractionResponse::from_record(&first).unwrap();
        let second = normalizer.normalize(&raw, "a.pdf");

        assert!(second.warnings.is_empty());
        assert_eq!(second.record, first);
    }
}
