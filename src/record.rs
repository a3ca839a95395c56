//! Records: an identifier plus an ordered map of predicate to values

use crate::error::{LinkError, Result};
use crate::value::Value;
use crate::vocab;
use indexmap::IndexMap;
use rand::distr::Alphanumeric;
use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Predicate name to values, in insertion order
pub type Fields = IndexMap<String, Vec<Value>>;

/// A graph entity
///
/// The id is always a `GlobalId` or `LocalId`. Field order and value order
/// within a field are preserved for deterministic serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: Value,
    fields: Fields,
}

impl Record {
    /// Create an empty record
    ///
    /// # Returns
    /// * `Err(LinkError::InvalidRecordId)` if `id` is a literal
    pub fn new(id: Value) -> Result<Self> {
        Self::with_fields(id, Fields::new())
    }

    /// Create a record with the given fields
    pub fn with_fields(id: Value, fields: Fields) -> Result<Self> {
        if !id.is_id() {
            return Err(LinkError::InvalidRecordId(format!(
                "literal {} cannot identify a record",
                id
            )));
        }
        Ok(Record { id, fields })
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    /// The id's lexical form, used as the key in a slice
    pub fn id_str(&self) -> &str {
        self.id.lexical()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Values of a field; empty when the field is absent
    pub fn get(&self, field: &str) -> &[Value] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&Value> {
        self.get(field).first()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Append a value to a field, creating the field if needed
    pub fn push(&mut self, field: impl Into<String>, value: Value) {
        self.fields.entry(field.into()).or_default().push(value);
    }

    /// Replace all values of a field
    pub fn set(&mut self, field: impl Into<String>, values: Vec<Value>) {
        self.fields.insert(field.into(), values);
    }

    pub fn remove(&mut self, field: &str) -> Option<Vec<Value>> {
        self.fields.shift_remove(field)
    }

    /// Rebuild every field, keeping the id
    pub fn map_fields<F>(self, f: F) -> Record
    where
        F: FnMut((String, Vec<Value>)) -> (String, Vec<Value>),
    {
        Record {
            id: self.id,
            fields: self.fields.into_iter().map(f).collect(),
        }
    }

    /// Copy of this record under another id
    pub fn with_id(&self, id: Value) -> Result<Record> {
        Record::with_fields(id, self.fields.clone())
    }

    /// Whether `rdf:type` includes `class`
    pub fn has_type(&self, class: &str) -> bool {
        self.get(vocab::RDF_TYPE)
            .iter()
            .any(|v| v.as_global() == Some(class))
    }
}

/// Source of fresh local ids for records built without an explicit id
pub trait LocalIdGenerator {
    /// Produce an id (including the `_:` prefix) not handed out before
    fn next_id(&mut self) -> String;
}

/// Random local ids, never repeating within one generator
pub struct RandomLocalIds<R: Rng> {
    rng: R,
    taken: HashSet<String>,
}

impl RandomLocalIds<ThreadRng> {
    pub fn new() -> Self {
        RandomLocalIds {
            rng: rand::rng(),
            taken: HashSet::new(),
        }
    }
}

impl Default for RandomLocalIds<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomLocalIds<StdRng> {
    /// Deterministic generator for tests and reproducible fixtures
    pub fn seeded(seed: u64) -> Self {
        RandomLocalIds {
            rng: StdRng::seed_from_u64(seed),
            taken: HashSet::new(),
        }
    }
}

impl<R: Rng> LocalIdGenerator for RandomLocalIds<R> {
    fn next_id(&mut self) -> String {
        loop {
            let suffix: String = (&mut self.rng)
                .sample_iter(Alphanumeric)
                .take(10)
                .map(char::from)
                .collect();
            let id = format!("{}{}", vocab::LOCAL_ID_PREFIX, suffix);
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// Counter-based local ids (`_:n0`, `_:n1`, ...)
#[derive(Debug, Default)]
pub struct SequentialLocalIds {
    next: u64,
}

impl LocalIdGenerator for SequentialLocalIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}n{}", vocab::LOCAL_ID_PREFIX, self.next);
        self.next += 1;
        id
    }
}

/// Fluent record construction
///
/// ```
/// use link_cache::{RecordBuilder, Value};
///
/// let record = RecordBuilder::new(Value::global("https://example.com/about"))
///     .unwrap()
///     .field("http://schema.org/name", Value::lang_string("About", "en"))
///     .build();
/// assert_eq!(record.get("http://schema.org/name").len(), 1);
/// ```
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(id: Value) -> Result<Self> {
        Ok(RecordBuilder {
            record: Record::new(id)?,
        })
    }

    /// Builder for a record with a freshly generated local id
    pub fn anonymous(ids: &mut dyn LocalIdGenerator) -> Self {
        RecordBuilder {
            record: Record {
                id: Value::LocalId(ids.next_id()),
                fields: Fields::new(),
            },
        }
    }

    pub fn field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.record.push(field, value);
        self
    }

    pub fn fields(mut self, field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        let field = field.into();
        for value in values {
            self.record.push(field.clone(), value);
        }
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}
