//! Hextuple ingestion
//!
//! Statements arrive as `[subject, predicate, object, datatype, language, graph]`.
//! Only current-state statements are ingested; metadata statements are skipped
//! and anything else aborts the batch.

use crate::data_slice::DataSlice;
use crate::error::{LinkError, Result};
use crate::record::Record;
use crate::value::Value;
use crate::vocab;
use indexmap::IndexMap;
use tracing::debug;

/// A flattened statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hextuple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub datatype: String,
    pub language: String,
    pub graph: String,
}

impl Hextuple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        datatype: impl Into<String>,
        language: impl Into<String>,
        graph: impl Into<String>,
    ) -> Self {
        Hextuple {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            datatype: datatype.into(),
            language: language.into(),
            graph: graph.into(),
        }
    }

    /// Parse a single JSON array line
    pub fn from_json_line(line: &str) -> Result<Self> {
        let (subject, predicate, object, datatype, language, graph): (String, String, String, String, String, String) =
            serde_json::from_str(line)
                .map_err(|e| LinkError::UnknownElement(format!("invalid hextuple '{}': {}", line, e)))?;
        Ok(Hextuple {
            subject,
            predicate,
            object,
            datatype,
            language,
            graph,
        })
    }

    fn subject_value(&self) -> Value {
        if self.subject.starts_with('_') {
            Value::LocalId(self.subject.clone())
        } else {
            Value::GlobalId(self.subject.clone())
        }
    }

    fn object_value(&self) -> Value {
        match self.datatype.as_str() {
            vocab::HEX_LOCAL_ID => Value::LocalId(self.object.clone()),
            vocab::HEX_GLOBAL_ID if self.object.starts_with('_') => Value::LocalId(self.object.clone()),
            vocab::HEX_GLOBAL_ID => Value::GlobalId(self.object.clone()),
            datatype => Value::literal(self.object.clone(), datatype, Some(self.language.as_str())),
        }
    }
}

/// Ingest statements into a slice
///
/// Values of repeated (subject, predicate) pairs accumulate in arrival order.
///
/// # Returns
/// * `Err(LinkError::NonSupplantStatement)` on the first statement in a graph
///   other than the supplant or meta graph
pub fn ingest<I>(tuples: I) -> Result<DataSlice>
where
    I: IntoIterator<Item = Hextuple>,
{
    let mut records: IndexMap<String, Record> = IndexMap::new();
    let mut skipped = 0usize;

    for tuple in tuples {
        match tuple.graph.as_str() {
            vocab::SUPPLANT_GRAPH => {}
            vocab::META_GRAPH => {
                skipped += 1;
                continue;
            }
            other => return Err(LinkError::non_supplant(other)),
        }

        let object = tuple.object_value();
        let record = match records.entry(tuple.subject.clone()) {
            indexmap::map::Entry::Occupied(entry) => entry.into_mut(),
            indexmap::map::Entry::Vacant(entry) => entry.insert(Record::new(tuple.subject_value())?),
        };
        record.push(tuple.predicate, object);
    }

    if skipped > 0 {
        debug!("Skipped {} metadata statements during ingestion", skipped);
    }

    Ok(records.into_values().collect())
}

/// Parse and ingest newline-delimited hextuple arrays
pub fn parse_hextuple_lines(body: &str) -> Result<DataSlice> {
    let tuples = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Hextuple::from_json_line)
        .collect::<Result<Vec<_>>>()?;
    ingest(tuples)
}
