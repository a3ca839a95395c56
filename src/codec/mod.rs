//! Wire codecs for graph data
//!
//! - [`json`]: compact tagged-JSON records and slice documents
//! - [`hextuple`]: ingestion of flat six-field statements

pub mod hextuple;
pub mod json;

use crate::data_slice::DataSlice;
use crate::error::Result;

/// Content type of newline-delimited compact JSON slice documents
pub const EMPATHY_NDJSON: &str = "application/empathy+x-ndjson";
/// Content type of newline-delimited hextuple arrays
pub const HEXTUPLE_NDJSON: &str = "application/hex+x-ndjson";

/// Body encodings a backend may answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Empathy,
    Hextuple,
}

impl BodyFormat {
    /// Pick the format from a Content-Type header; compact JSON unless hextuples are announced
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.trim_start().starts_with(HEXTUPLE_NDJSON) => BodyFormat::Hextuple,
            _ => BodyFormat::Empathy,
        }
    }

    /// Decode a full response body in this format
    pub fn decode(&self, body: &str) -> Result<DataSlice> {
        match self {
            BodyFormat::Empathy => json::parse_slice_lines(body),
            BodyFormat::Hextuple => hextuple::parse_hextuple_lines(body),
        }
    }
}
