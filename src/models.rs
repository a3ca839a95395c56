//! Core pipeline models: cache requests and cache entries

use crate::data_slice::DataSlice;
use crate::iri;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cacheability of a backend response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheControl {
    Public,
    #[default]
    Private,
    NoCache,
}

impl CacheControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheControl::Public => "public",
            CacheControl::Private => "private",
            CacheControl::NoCache => "no-cache",
        }
    }

    /// Parse the stored representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(CacheControl::Public),
            "private" => Some(CacheControl::Private),
            "no-cache" => Some(CacheControl::NoCache),
            _ => None,
        }
    }

    /// Derive cacheability from an HTTP Cache-Control header
    ///
    /// `private` wins over `no-cache`/`no-store`, which win over `public`.
    /// A missing or unrecognised header is treated as private.
    pub fn from_header(header: Option<&str>) -> Self {
        let directives: Vec<String> = header
            .unwrap_or_default()
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .collect();
        let has = |name: &str| directives.iter().any(|d| d == name);

        if has("private") {
            CacheControl::Private
        } else if has("no-cache") || has("no-store") {
            CacheControl::NoCache
        } else if has("public") {
            CacheControl::Public
        } else {
            CacheControl::Private
        }
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource requested in a bulk call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheRequest {
    pub iri: String,
}

impl CacheRequest {
    pub fn new(iri: impl Into<String>) -> Self {
        CacheRequest { iri: iri.into() }
    }

    /// Build from a decoded `resource[]` parameter
    ///
    /// The fragment and a trailing slash are stripped.
    pub fn from_param(decoded: &str) -> Self {
        CacheRequest {
            iri: iri::normalize_request_iri(decoded.trim()),
        }
    }
}

/// The outcome of resolving one resource, cached or fresh
///
/// Entries are never mutated; a newer result replaces the whole entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub iri: String,
    pub status: u16,
    pub cache_control: CacheControl,
    pub contents: Option<DataSlice>,
}

impl CacheEntry {
    pub fn new(
        iri: impl Into<String>,
        status: u16,
        cache_control: CacheControl,
        contents: Option<DataSlice>,
    ) -> Self {
        CacheEntry {
            iri: iri.into(),
            status,
            cache_control,
            contents,
        }
    }

    /// Entry for a resource whose fetch failed before a body was received
    pub fn failed(iri: impl Into<String>, status: u16) -> Self {
        CacheEntry::new(iri, status, CacheControl::Private, None)
    }

    pub fn has_contents(&self) -> bool {
        self.contents.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Public entry with contents that can be served without authorization
    pub fn is_public_hit(&self) -> bool {
        self.status == 200 && self.cache_control == CacheControl::Public && self.has_contents()
    }

    /// Whether a freshly fetched entry may be written back to the store
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.cache_control != CacheControl::Private
    }
}
