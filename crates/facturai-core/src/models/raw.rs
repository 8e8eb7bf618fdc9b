//! Unvalidated extraction responses.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::invoice::InvoiceRecord;

lazy_static! {
    // Markdown code fence, optionally tagged as json
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```").unwrap();
}

/// Best-effort parse returned by an extraction gateway.
///
/// No shape is guaranteed; the normalizer is responsible for validating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawExtractionResponse(serde_json::Value);

impl RawExtractionResponse {
    /// Wrap an arbitrary JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// An empty object, used when no response is available.
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Parse model output text, unwrapping a Markdown code fence if present.
    pub fn from_text(text: &str) -> Result<Self, GatewayError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        let json = CODE_FENCE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(trimmed);

        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| GatewayError::InvalidJson(e.to_string()))
    }

    /// Re-express a normalized record as a raw response.
    ///
    /// Amounts are written so that every [`DecimalConvention`] reads them
    /// back unchanged.
    ///
    /// [`DecimalConvention`]: crate::normalize::DecimalConvention
    pub fn from_record(record: &InvoiceRecord) -> serde_json::Result<Self> {
        let mut value = serde_json::to_value(record)?;

        if let Some(obj) = value.as_object_mut() {
            for (key, amount) in [
                ("taxable_base", record.taxable_base),
                ("vat_amount", record.vat_amount),
                ("irpf_withholding", record.irpf_withholding),
                ("total", record.total),
            ] {
                obj.insert(key.to_string(), neutral_amount(amount));
            }

            if let Some(items) = obj.get_mut("line_items").and_then(Value::as_array_mut) {
                for (item, line) in items.iter_mut().zip(&record.line_items) {
                    let Some(item) = item.as_object_mut() else {
                        continue;
                    };
                    item.insert("quantity".to_string(), neutral_amount(line.quantity));
                    item.insert("unit_price".to_string(), neutral_amount(line.unit_price));
                    item.insert("line_total".to_string(), neutral_amount(line.line_total));
                }
            }
        }

        Ok(Self(value))
    }

    /// Borrow the underlying value.
    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

// "1.234" is 1234 under the comma convention; "1.2340" is not ambiguous
fn neutral_amount(amount: Decimal) -> Value {
    let mut text = amount.to_string();
    if amount.scale() == 3 {
        text.push('0');
    }
    Value::String(text)
}

impl From<serde_json::Value> for RawExtractionResponse {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_text_plain_json() {
        let raw = RawExtractionResponse::from_text(r#"[{"TOTAL": 121.0}]"#).unwrap();
        assert_eq!(raw.value(), &json!([{"TOTAL": 121.0}]));
    }

    #[test]
    fn test_from_text_fenced_json() {
        let text = "```json\n{\"Numero de Factura\": \"INV-1\"}\n```";
        let raw = RawExtractionResponse::from_text(text).unwrap();
        assert_eq!(raw.value(), &json!({"Numero de Factura": "INV-1"}));
    }

    #[test]
    fn test_from_text_fence_with_prose() {
        let text = "Here is the result:\n```\n{\"total\": \"10\"}\n```\nDone.";
        let raw = RawExtractionResponse::from_text(text).unwrap();
        assert_eq!(raw.value(), &json!({"total": "10"}));
    }

    #[test]
    fn test_from_text_errors() {
        assert!(matches!(
            RawExtractionResponse::from_text("   "),
            Err(GatewayError::EmptyResponse)
        ));
        assert!(matches!(
            RawExtractionResponse::from_text("not json"),
            Err(GatewayError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_from_record_amounts_are_unambiguous() {
        let mut record = InvoiceRecord::new("a.pdf");
        record.total = Decimal::new(1234, 3);
        record.vat_amount = Decimal::new(2100, 2);
        record.line_items = vec![crate::models::invoice::LineItem {
            quantity: Decimal::new(500, 3),
            ..Default::default()
        }];

        let raw = RawExtractionResponse::from_record(&record).unwrap();
        assert_eq!(raw.value()["total"], json!("1.2340"));
        assert_eq!(raw.value()["vat_amount"], json!("21.00"));
        assert_eq!(raw.value()["line_items"][0]["quantity"], json!("0.5000"));
        assert_eq!(raw.value()["status"], json!("ok"));
    }

    #[test]
    fn test_empty_is_object() {
        assert!(RawExtractionResponse::empty().value().is_object());
    }
}
