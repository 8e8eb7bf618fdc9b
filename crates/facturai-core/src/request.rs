//! Extraction request descriptors.

use std::path::{Path, PathBuf};

use crate::input::{enumerate_invoices, source_name};
use crate::models::config::InputConfig;

/// Instructions sent with every invoice.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert invoice parser. Extract the fields of the attached invoice document.
Return a single JSON object with exactly these keys. If a field is not found, use null or an empty string.
Amounts must be numbers without currency symbols. Dates must use the YYYY-MM-DD format.

- "issuer_tax_id": supplier CIF/NIF (string)
- "issuer_name": supplier name (string)
- "recipient_tax_id": client CIF/NIF (string)
- "recipient_name": client name (string)
- "invoice_number": invoice number (string)
- "issue_date": invoice date (YYYY-MM-DD string)
- "taxable_base": base imponible (number)
- "vat_amount": IVA amount (number)
- "irpf_withholding": retencion IRPF amount (number)
- "total": invoice total (number)
- "currency": ISO 4217 currency code (string)
- "iban": IBAN of the payment account (string)
- "payment_method": forma de pago (string)
- "line_items": array of objects with "description" (string), "quantity" (number), "unit_price" (number) and "line_total" (number)
"#;

/// Everything the extraction gateway needs for one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Position of the file in enumeration order.
    pub index: usize,
    /// Name identifying the file in records.
    pub source_file: String,
    /// Path of the invoice on disk.
    pub path: PathBuf,
    /// Instruction block describing the extraction schema.
    pub instructions: &'static str,
}

/// Build the request for the `index`-th enumerated file.
pub fn build_request(index: usize, path: &Path, input_dir: &Path) -> ExtractionRequest {
    ExtractionRequest {
        index,
        source_file: source_name(input_dir, path),
        path: path.to_path_buf(),
        instructions: EXTRACTION_PROMPT,
    }
}

/// Enumerate `input_dir` and build one request per invoice, in order.
pub fn build_requests(input_dir: &Path, config: &InputConfig) -> crate::Result<Vec<ExtractionRequest>> {
    let files = enumerate_invoices(input_dir, config)?;
    Ok(files
        .iter()
        .enumerate()
        .map(|(index, path)| build_request(index, path, input_dir))
        .collect())
}

impl ExtractionRequest {
    /// `file://` reference to the document.
    pub fn document_uri(&self) -> String {
        let absolute = std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone());
        let path = absolute.to_string_lossy().replace('\\', "/");
        if path.starts_with('/') {
            format!("file://{}", path)
        } else {
            format!("file:///{}", path)
        }
    }

    /// Instructions followed by the document reference.
    pub fn full_prompt(&self) -> String {
        format!(
            "{}\nProcess the following PDF file: {}",
            self.instructions,
            self.document_uri()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_request() {
        let request = build_request(3, Path::new("/data/in/sub/a.pdf"), Path::new("/data/in"));
        assert_eq!(request.index, 3);
        assert_eq!(request.source_file, "sub/a.pdf");
        assert_eq!(request.path, PathBuf::from("/data/in/sub/a.pdf"));
        assert_eq!(request.instructions, EXTRACTION_PROMPT);
    }

    #[test]
    fn test_build_requests_indexes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.pdf", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }

        let requests = build_requests(dir.path(), &InputConfig::default()).unwrap();
        let described: Vec<(usize, &str)> = requests
            .iter()
            .map(|r| (r.index, r.source_file.as_str()))
            .collect();
        assert_eq!(described, vec![(0, "a.pdf"), (1, "b.pdf")]);
    }

    #[test]
    fn test_build_requests_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let requests = build_requests(&dir.path().join("Data"), &InputConfig::default()).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_document_uri() {
        let request = build_request(0, Path::new("/data/in/a.pdf"), Path::new("/data/in"));
        assert_eq!(request.document_uri(), "file:///data/in/a.pdf");
    }

    #[test]
    fn test_full_prompt_mentions_every_field() {
        let request = build_request(0, Path::new("a.pdf"), Path::new("."));
        let prompt = request.full_prompt();
        for key in ["issuer_tax_id", "issue_date", "total", "line_items", "payment_method"] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("file://"));
        assert!(prompt.ends_with("a.pdf"));
    }
}
