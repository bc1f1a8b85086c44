//! Recognition capability: document bytes in, raw candidate fields out.
//!
//! The recognition service itself is external. This module defines the
//! contract the extraction pool calls, the raw output shape it produces and
//! the parser for the service's JSON payload.

mod payload;

pub use payload::{PayloadRecognizer, parse_payload};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;
use crate::models::document::MediaType;

/// Raw `(key, value)` pairs of one table row, in the order returned.
pub type RawRow = Vec<(String, String)>;

/// Best-effort output of the recognition service for one document.
///
/// Keys are whatever the service chose to call them and may repeat; alias
/// resolution happens later, during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtraction {
    /// Document-level fields such as supplier or order number.
    pub header: RawRow,

    /// Table rows in document order.
    pub rows: Vec<RawRow>,
}

impl RawExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document-level field.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.push((key.into(), value.into()));
        self
    }

    /// Append a row built from `(key, value)` pairs.
    pub fn with_row<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.rows
            .push(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A recognition backend.
///
/// Implementations must be cheap to share across tasks; the extraction pool
/// calls `recognize` concurrently from several workers.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize one document.
    async fn recognize(
        &self,
        bytes: &[u8],
        media_type: &MediaType,
    ) -> Result<RawExtraction, RecognitionError>;
}
