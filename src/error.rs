//! Error types for the link cache

use thiserror::Error;

/// Result type alias for link cache operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Error types that can occur while decoding graph data or serving bulk requests
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Statement in unsupported graph: {graph}")]
    NonSupplantStatement { graph: String },

    #[error("Unknown value: {0}")]
    UnknownValue(String),

    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    #[error("Bulk backend '{service}' returned status {status}")]
    BulkBackend { service: String, status: u16 },

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::ParseError(err.to_string())
    }
}

impl LinkError {
    /// Whether this error fails the whole bulk request
    ///
    /// Decode errors only ever affect a single backend item and store errors are
    /// degraded into cache misses, so neither aborts a request on its own.
    pub fn is_fatal_for_request(&self) -> bool {
        match self {
            LinkError::BulkBackend { .. } => true,
            LinkError::TenantNotFound(_) => true,
            LinkError::Unauthorized(_) => true,
            LinkError::ParseError(_) => true,
            LinkError::InvalidIri(_) => true,
            LinkError::ConfigError(_) => true,
            LinkError::InternalError(_) => true,

            LinkError::NonSupplantStatement { .. } => false,
            LinkError::UnknownValue(_) => false,
            LinkError::UnknownElement(_) => false,
            LinkError::InvalidRecordId(_) => false,
            LinkError::HttpError(_) => false,
            LinkError::StoreError(_) => false,
            LinkError::IoError(_) => false,
        }
    }

    /// Convert error to the HTTP status returned to the client
    pub fn to_http_status(&self) -> u16 {
        match self {
            LinkError::ParseError(_) => 400,
            LinkError::InvalidIri(_) => 400,
            LinkError::UnknownValue(_) => 400,
            LinkError::UnknownElement(_) => 400,
            LinkError::InvalidRecordId(_) => 400,
            LinkError::NonSupplantStatement { .. } => 400,

            LinkError::Unauthorized(_) => 401,
            LinkError::TenantNotFound(_) => 404,

            // Backend failures become 502 Bad Gateway
            LinkError::BulkBackend { .. } => 502,
            LinkError::HttpError(_) => 502,

            LinkError::StoreError(_) => 500,
            LinkError::ConfigError(_) => 500,
            LinkError::IoError(_) => 500,
            LinkError::InternalError(_) => 500,
        }
    }

    /// Create a BulkBackend error for a service
    pub fn bulk_backend(service: impl Into<String>, status: u16) -> Self {
        LinkError::BulkBackend {
            service: service.into(),
            status,
        }
    }

    /// Create a NonSupplantStatement error for a graph name
    pub fn non_supplant(graph: impl Into<String>) -> Self {
        LinkError::NonSupplantStatement {
            graph: graph.into(),
        }
    }
}
