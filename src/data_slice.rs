//! Bounded graph snapshots keyed by record id
//!
//! A `DataSlice` is not a database: a missing record means "not fetched",
//! never "does not exist". Transformations return new slices.

use crate::iri;
use crate::record::{Fields, Record};
use crate::value::Value;
use crate::vocab;
use indexmap::IndexMap;
use tracing::debug;
use url::Url;

/// Map of id string to record, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSlice {
    records: IndexMap<String, Record>,
}

impl DataSlice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a slice from records; later duplicates replace earlier ones
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut slice = DataSlice::new();
        for record in records {
            slice.insert(record);
        }
        slice
    }

    /// Insert or replace the record stored under its id
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id_str().to_string(), record);
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn into_records(self) -> impl Iterator<Item = Record> {
        self.records.into_values()
    }

    /// Overlay slices left to right
    ///
    /// Colliding ids are replaced record-wise: the later slice's record wins
    /// in full, fields are never combined.
    pub fn merge<I>(slices: I) -> DataSlice
    where
        I: IntoIterator<Item = DataSlice>,
    {
        let mut merged = DataSlice::new();
        for slice in slices {
            for (id, record) in slice.records {
                merged.records.insert(id, record);
            }
        }
        merged
    }

    /// Shorten ids and resource references relative to a website
    ///
    /// Without a website the slice is returned unchanged. Ids starting with
    /// `_:` become local ids; everything else is shortened to a path when it
    /// shares the website's origin.
    pub fn compact(&self, website_iri: Option<&str>) -> DataSlice {
        let website = match website_iri.and_then(|w| Url::parse(w).ok()) {
            Some(website) => website,
            None => {
                if website_iri.is_some() {
                    debug!("Skipping compaction: unparsable website IRI {:?}", website_iri);
                }
                return self.clone();
            }
        };

        let compact_id = |id: &str| -> Value {
            if id.starts_with(vocab::LOCAL_ID_PREFIX) {
                Value::LocalId(id.to_string())
            } else {
                Value::GlobalId(iri::shorten(id, &website))
            }
        };

        let mut compacted = DataSlice::new();
        for record in self.records.values() {
            let fields: Fields = record
                .fields()
                .iter()
                .map(|(key, values)| {
                    let values = values
                        .iter()
                        .map(|value| match value {
                            Value::GlobalId(iri) => compact_id(iri),
                            other => other.clone(),
                        })
                        .collect();
                    (key.clone(), values)
                })
                .collect();

            let id = compact_id(record.id_str());
            if let Ok(record) = Record::with_fields(id, fields) {
                compacted.insert(record);
            }
        }
        compacted
    }
}

impl FromIterator<Record> for DataSlice {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        DataSlice::from_records(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;

    fn record(id: &str, name: &str) -> Record {
        RecordBuilder::new(Value::global(id))
            .unwrap()
            .field("http://schema.org/name", Value::string(name))
            .build()
    }

    #[test]
    fn test_merge_is_right_biased() {
        let a = DataSlice::from_records(vec![record("https://a.test/1", "old"), record("https://a.test/2", "two")]);
        let b = DataSlice::from_records(vec![record("https://a.test/1", "new")]);

        let merged = DataSlice::merge(vec![a, b.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("https://a.test/1"), b.get("https://a.test/1"));
    }

    #[test]
    fn test_merge_replaces_whole_record() {
        let a = DataSlice::from_records(vec![RecordBuilder::new(Value::global("https://a.test/1"))
            .unwrap()
            .field("x", Value::string("1"))
            .field("y", Value::string("2"))
            .build()]);
        let b = DataSlice::from_records(vec![RecordBuilder::new(Value::global("https://a.test/1"))
            .unwrap()
            .field("x", Value::string("3"))
            .build()]);

        let merged = DataSlice::merge(vec![a, b]);
        let merged_record = merged.get("https://a.test/1").unwrap();
        assert!(!merged_record.contains("y"));
        assert_eq!(merged_record.get("x"), &[Value::string("3")]);
    }

    #[test]
    fn test_merge_empty_and_single() {
        assert!(DataSlice::merge(Vec::new()).is_empty());

        let a = DataSlice::from_records(vec![record("https://a.test/1", "one")]);
        assert_eq!(DataSlice::merge(vec![a.clone()]), a);
    }

    #[test]
    fn test_compact_without_website_is_identity() {
        let a = DataSlice::from_records(vec![record("https://a.test/1", "one")]);
        assert_eq!(a.compact(None), a);
    }

    #[test]
    fn test_compact_rewrites_ids_and_references() {
        let source = RecordBuilder::new(Value::global("https://example.com/info/about"))
            .unwrap()
            .field("http://schema.org/author", Value::global("https://example.com/people/1"))
            .field("http://schema.org/sameAs", Value::global("https://other.test/x"))
            .field("http://schema.org/image", Value::global("_:img"))
            .field("http://schema.org/name", Value::string("About"))
            .build();
        let slice = DataSlice::from_records(vec![source]);

        let compacted = slice.compact(Some("https://example.com/info"));
        let about = compacted.get("/info/about").expect("shortened id");
        assert_eq!(about.id(), &Value::global("/info/about"));
        assert_eq!(about.get("http://schema.org/author"), &[Value::global("/people/1")]);
        assert_eq!(about.get("http://schema.org/sameAs"), &[Value::global("https://other.test/x")]);
        assert_eq!(about.get("http://schema.org/image"), &[Value::local("_:img")]);
        assert_eq!(about.get("http://schema.org/name"), &[Value::string("About")]);
    }

    #[test]
    fn test_compact_keeps_local_ids() {
        let slice = DataSlice::from_records(vec![RecordBuilder::new(Value::local("_:b0")).unwrap().build()]);
        let compacted = slice.compact(Some("https://example.com/"));
        assert_eq!(compacted.get("_:b0").unwrap().id(), &Value::local("_:b0"));
    }
}
