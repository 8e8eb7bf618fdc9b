//! Core library for LLM-assisted invoice extraction.
//!
//! This crate provides:
//! - Input discovery of invoice PDFs in a directory
//! - Extraction request building and the extraction gateways (live Gemini
//!   service or positional mock playback)
//! - Normalization of loosely-typed responses into [`InvoiceRecord`]s
//! - Batch consistency checks (tax-id mismatches, duplicate invoices)
//! - Timestamped CSV/JSON export

pub mod checks;
pub mod error;
pub mod export;
pub mod gateway;
pub mod input;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod request;

pub use checks::{BatchIssue, check_batch};
pub use error::{ExportError, FacturaiError, GatewayError, InputError, MockError, Result};
pub use export::{ExportFormat, Exporter};
pub use gateway::{ExtractionGateway, GeminiGateway, MockGateway, MockResponseSet};
pub use input::enumerate_invoices;
pub use models::config::FacturaiConfig;
pub use models::invoice::{InvoiceRecord, LineItem, RecordStatus};
pub use models::raw::RawExtractionResponse;
pub use normalize::{DecimalConvention, Normalized, NormalizeWarning, Normalizer, WarningKind};
pub use pipeline::{BatchOutcome, BatchStats, Pipeline};
pub use request::{ExtractionRequest, build_request, build_requests};
