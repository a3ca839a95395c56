//! Splitting multilingual records into per-language copies
//!
//! A record announcing language alternates in its `_ids` field is replaced by
//! a canonical record holding `_translations`, plus one localized record per
//! alternate. Links between localized records are then rewritten so each
//! language only points at records of the same language.

use crate::data_slice::DataSlice;
use crate::error::Result;
use crate::iri;
use crate::record::{Fields, Record};
use crate::value::Value;
use crate::vocab;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Filter a record's fields down to what is relevant for `lang`
///
/// Language strings in other languages are dropped. References to
/// translated objects are replaced by the object's value when its language
/// matches, and dropped otherwise. Fields left without values are omitted.
pub fn filter_fields(record: &Record, lang: &str, slice: &DataSlice) -> Fields {
    record
        .fields()
        .iter()
        .filter_map(|(field, values)| {
            let filtered = filter_values(values, lang, slice);
            if filtered.is_empty() && !values.is_empty() {
                None
            } else {
                Some((field.clone(), filtered))
            }
        })
        .collect()
}

fn filter_values(values: &[Value], lang: &str, slice: &DataSlice) -> Vec<Value> {
    let mut filtered = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::LangString { lang: value_lang, .. } => {
                if value_lang == lang {
                    filtered.push(value.clone());
                }
            }
            Value::GlobalId(id) | Value::LocalId(id) => match translated_object(slice, id) {
                Some(target) => {
                    let matches = target
                        .first(vocab::LIBRO_LANGUAGE)
                        .map(|l| l.lexical() == lang)
                        .unwrap_or(false);
                    if matches {
                        filtered.extend(target.get(vocab::LIBRO_VALUE).iter().cloned());
                    }
                }
                None => filtered.push(value.clone()),
            },
            other => filtered.push(other.clone()),
        }
    }
    filtered
}

fn translated_object<'a>(slice: &'a DataSlice, id: &str) -> Option<&'a Record> {
    slice
        .get(id)
        .filter(|record| record.has_type(vocab::LIBRO_TRANSLATED_OBJECT))
}

/// Split every record carrying `_ids` alternates into per-language records
///
/// # Returns
/// A new slice with canonical records in place of the originals, followed by
/// their localized copies, with same-language links rewritten.
pub fn split_languages(slice: &DataSlice, website: &Url) -> Result<DataSlice> {
    let (records, canonical_by_id) = localize_records(slice, website)?;
    debug!(
        "Split {} multilingual records into {} records",
        canonical_by_id.len(),
        records.len()
    );

    Ok(records
        .into_iter()
        .map(|record| rewrite_links(record, &canonical_by_id))
        .collect())
}

fn localize_records(slice: &DataSlice, website: &Url) -> Result<(Vec<Record>, HashMap<String, Record>)> {
    let mut records = Vec::with_capacity(slice.len());
    let mut canonical_by_id = HashMap::new();

    for record in slice.records() {
        let alternates = record.get(vocab::FIELD_IDS);
        if alternates.is_empty() {
            records.push(record.clone());
            continue;
        }
        if record.id().is_local() {
            warn!("Ignoring language alternates on local record {}", record.id_str());
            records.push(record.clone());
            continue;
        }

        let mut canonical = Record::new(record.id().clone())?;
        let mut localized = Vec::with_capacity(alternates.len());

        for alternate in alternates {
            let (slug, lang) = match alternate {
                Value::LangString { lexical, lang } => (lexical.as_str(), lang.as_str()),
                other => {
                    warn!("Skipping non-language alternate {} on {}", other, record.id_str());
                    continue;
                }
            };

            let localized_id = iri::localize(record.id_str(), website, lang, Some(slug))?;

            let mut fields = filter_fields(record, lang, slice);
            fields.shift_remove(vocab::FIELD_IDS);
            fields.insert(vocab::FIELD_CANONICAL.to_string(), vec![record.id().clone()]);
            fields.insert(vocab::FIELD_LANGUAGE.to_string(), vec![Value::string(lang)]);

            canonical.push(
                vocab::FIELD_TRANSLATIONS,
                Value::lang_string(localized_id.clone(), lang),
            );
            localized.push(Record::with_fields(Value::GlobalId(localized_id), fields)?);
        }

        canonical_by_id.insert(record.id_str().to_string(), canonical.clone());
        records.push(canonical);
        records.extend(localized);
    }

    Ok((records, canonical_by_id))
}

/// Point links inside a localized record at same-language copies
fn rewrite_links(record: Record, canonical_by_id: &HashMap<String, Record>) -> Record {
    let lang = match record.first(vocab::FIELD_LANGUAGE) {
        Some(lang) => lang.lexical().to_string(),
        None => return record,
    };

    record.map_fields(|(field, values)| {
        if vocab::is_reserved_field(&field) {
            return (field, values);
        }
        let values = values
            .into_iter()
            .map(|value| {
                let translated = match &value {
                    Value::GlobalId(target) => translation_of(canonical_by_id, target, &lang),
                    _ => None,
                };
                translated.map(Value::GlobalId).unwrap_or(value)
            })
            .collect();
        (field, values)
    })
}

fn translation_of(canonical_by_id: &HashMap<String, Record>, target: &str, lang: &str) -> Option<String> {
    canonical_by_id
        .get(target)?
        .get(vocab::FIELD_TRANSLATIONS)
        .iter()
        .find(|t| t.language() == Some(lang))
        .map(|t| t.lexical().to_string())
}
