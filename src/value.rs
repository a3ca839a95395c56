//! Graph values: resource identifiers and typed literals
//!
//! Every variant carries its canonical lexical form, which is what equality,
//! serialization and logging operate on.

use crate::vocab;
use std::fmt;

/// A single graph value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Absolute resource identifier
    GlobalId(String),
    /// Scoped identifier, conventionally prefixed with `_:`
    LocalId(String),
    Bool(String),
    Int32(String),
    Int64(String),
    Str(String),
    DateTime(String),
    /// Literal with a datatype that has no dedicated variant
    Primitive { lexical: String, datatype: String },
    /// Natural-language string
    LangString { lexical: String, lang: String },
}

impl Value {
    pub fn global(iri: impl Into<String>) -> Self {
        Value::GlobalId(iri.into())
    }

    pub fn local(id: impl Into<String>) -> Self {
        Value::LocalId(id.into())
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Value::Str(lexical.into())
    }

    pub fn lang_string(lexical: impl Into<String>, lang: impl Into<String>) -> Self {
        Value::LangString {
            lexical: lexical.into(),
            lang: lang.into(),
        }
    }

    pub fn primitive(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Value::Primitive {
            lexical: lexical.into(),
            datatype: datatype.into(),
        }
    }

    /// Classify a literal by its datatype IRI
    ///
    /// The five XML Schema datatypes with a dedicated variant map onto it; any
    /// other datatype becomes a `LangString` when a language is present and a
    /// `Primitive` otherwise.
    pub fn literal(lexical: impl Into<String>, datatype: &str, lang: Option<&str>) -> Self {
        let lexical = lexical.into();
        match datatype {
            vocab::XSD_BOOLEAN => Value::Bool(lexical),
            vocab::XSD_INTEGER => Value::Int32(lexical),
            vocab::XSD_LONG => Value::Int64(lexical),
            vocab::XSD_STRING => Value::Str(lexical),
            vocab::XSD_DATE_TIME => Value::DateTime(lexical),
            _ => match lang {
                Some(lang) if !lang.is_empty() => Value::LangString {
                    lexical,
                    lang: lang.to_string(),
                },
                _ => Value::Primitive {
                    lexical,
                    datatype: datatype.to_string(),
                },
            },
        }
    }

    /// The canonical lexical form
    pub fn lexical(&self) -> &str {
        match self {
            Value::GlobalId(s)
            | Value::LocalId(s)
            | Value::Bool(s)
            | Value::Int32(s)
            | Value::Int64(s)
            | Value::Str(s)
            | Value::DateTime(s) => s,
            Value::Primitive { lexical, .. } => lexical,
            Value::LangString { lexical, .. } => lexical,
        }
    }

    /// Datatype IRI, or the hextuple marker for identifiers
    pub fn datatype(&self) -> &str {
        match self {
            Value::GlobalId(_) => vocab::HEX_GLOBAL_ID,
            Value::LocalId(_) => vocab::HEX_LOCAL_ID,
            Value::Bool(_) => vocab::XSD_BOOLEAN,
            Value::Int32(_) => vocab::XSD_INTEGER,
            Value::Int64(_) => vocab::XSD_LONG,
            Value::Str(_) => vocab::XSD_STRING,
            Value::DateTime(_) => vocab::XSD_DATE_TIME,
            Value::Primitive { datatype, .. } => datatype,
            Value::LangString { .. } => vocab::RDF_LANG_STRING,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Value::LangString { lang, .. } => Some(lang),
            _ => None,
        }
    }

    /// Whether this value can identify a record
    pub fn is_id(&self) -> bool {
        matches!(self, Value::GlobalId(_) | Value::LocalId(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Value::LocalId(_))
    }

    pub fn as_global(&self) -> Option<&str> {
        match self {
            Value::GlobalId(iri) => Some(iri),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::GlobalId(iri) => write!(f, "<{}>", iri),
            Value::LocalId(id) => write!(f, "{}", id),
            Value::LangString { lexical, lang } => write!(f, "\"{}\"@{}", lexical, lang),
            Value::Str(lexical) => write!(f, "\"{}\"", lexical),
            other => write!(f, "\"{}\"^^<{}>", other.lexical(), other.datatype()),
        }
    }
}
