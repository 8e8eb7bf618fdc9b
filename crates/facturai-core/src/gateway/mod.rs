//! Extraction gateways: obtain a raw structured parse of one invoice.
//!
//! The run picks one implementation at startup and hands it to the
//! [`Pipeline`](crate::pipeline::Pipeline) as a trait object:
//! - [`GeminiGateway`] sends the document to the Gemini API.
//! - [`MockGateway`] replays responses loaded from a JSON file.

mod gemini;
mod mock;

pub use gemini::GeminiGateway;
pub use mock::{MockGateway, MockResponseSet};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::raw::RawExtractionResponse;
use crate::request::ExtractionRequest;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Source of raw extraction responses.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Obtain the raw extraction for one invoice.
    async fn extract(&self, request: &ExtractionRequest) -> Result<RawExtractionResponse>;
}
