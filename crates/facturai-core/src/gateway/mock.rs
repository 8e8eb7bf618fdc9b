//! Positional playback of pre-supplied responses.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ExtractionGateway, Result};
use crate::error::MockError;
use crate::models::raw::RawExtractionResponse;
use crate::request::ExtractionRequest;

/// Ordered responses loaded from a mock file.
#[derive(Debug, Clone, Default)]
pub struct MockResponseSet {
    responses: Vec<RawExtractionResponse>,
}

impl MockResponseSet {
    /// Create a set from responses in file order.
    pub fn new(responses: Vec<RawExtractionResponse>) -> Self {
        Self { responses }
    }

    /// Load a JSON array of responses.
    pub fn from_file(path: &Path) -> std::result::Result<Self, MockError> {
        let content = std::fs::read_to_string(path).map_err(|source| MockError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| MockError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let serde_json::Value::Array(items) = value else {
            return Err(MockError::NotAnArray(path.to_path_buf()));
        };

        info!("Loaded {} mock responses from {}", items.len(), path.display());
        Ok(Self::new(items.into_iter().map(RawExtractionResponse::new).collect()))
    }

    /// Number of responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Check whether the set holds no responses.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Response paired with the `index`-th file.
    pub fn get(&self, index: usize) -> Option<&RawExtractionResponse> {
        self.responses.get(index)
    }
}

/// Gateway replaying a [`MockResponseSet`] by file position.
///
/// Files beyond the end of the set receive an empty response, which
/// normalizes to a fully defaulted record.
pub struct MockGateway {
    responses: MockResponseSet,
}

impl MockGateway {
    /// Create a mock gateway.
    pub fn new(responses: MockResponseSet) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl ExtractionGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<RawExtractionResponse> {
        match self.responses.get(request.index) {
            Some(response) => {
                debug!("Mock response #{} for {}", request.index, request.source_file);
                Ok(response.clone())
            }
            None => {
                warn!(
                    "No mock response #{} for {} ({} supplied), using empty response",
                    request.index,
                    request.source_file,
                    self.responses.len()
                );
                Ok(RawExtractionResponse::empty())
            }
        }
    }
}
