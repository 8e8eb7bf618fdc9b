//! Data models for facturai.

pub mod config;
pub mod invoice;
pub mod raw;

pub use config::FacturaiConfig;
pub use invoice::{InvoiceRecord, LineItem, RecordStatus};
pub use raw::RawExtractionResponse;
