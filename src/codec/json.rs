//! Compact tagged-JSON codec
//!
//! A record serializes as `{"_id": <value>, "<predicate>": <value> | [<value>...]}`
//! where a value object is `{"type": <tag>, "v": <lexical>}` with an extra
//! `dt` (datatype) for `p` and `l` (language) for `ls`. A field holding exactly
//! one value is written as a bare object.

use crate::data_slice::DataSlice;
use crate::error::{LinkError, Result};
use crate::record::{Fields, Record};
use crate::value::Value;
use serde_json::{Map, Value as JsonValue};

const ID_KEY: &str = "_id";

const TYPE_GLOBAL: &str = "id";
const TYPE_LOCAL: &str = "lid";
const TYPE_BOOL: &str = "b";
const TYPE_INT32: &str = "i";
const TYPE_INT64: &str = "l";
const TYPE_STRING: &str = "s";
const TYPE_DATE_TIME: &str = "dt";
const TYPE_PRIMITIVE: &str = "p";
const TYPE_LANG_STRING: &str = "ls";

/// Encode a single value object
pub fn encode_value(value: &Value) -> JsonValue {
    let mut obj = Map::new();
    let tag = match value {
        Value::GlobalId(_) => TYPE_GLOBAL,
        Value::LocalId(_) => TYPE_LOCAL,
        Value::Bool(_) => TYPE_BOOL,
        Value::Int32(_) => TYPE_INT32,
        Value::Int64(_) => TYPE_INT64,
        Value::Str(_) => TYPE_STRING,
        Value::DateTime(_) => TYPE_DATE_TIME,
        Value::Primitive { .. } => TYPE_PRIMITIVE,
        Value::LangString { .. } => TYPE_LANG_STRING,
    };
    obj.insert("type".to_string(), JsonValue::from(tag));
    obj.insert("v".to_string(), JsonValue::from(value.lexical()));
    match value {
        Value::Primitive { datatype, .. } => {
            obj.insert("dt".to_string(), JsonValue::from(datatype.as_str()));
        }
        Value::LangString { lang, .. } => {
            obj.insert("l".to_string(), JsonValue::from(lang.as_str()));
        }
        _ => {}
    }
    JsonValue::Object(obj)
}

/// Decode a single value object
///
/// # Returns
/// * `Err(LinkError::UnknownValue)` for an unrecognised tag, a missing `v`,
///   or a `p`/`ls` value without its datatype/language
pub fn decode_value(json: &JsonValue) -> Result<Value> {
    let obj = json
        .as_object()
        .ok_or_else(|| LinkError::UnknownValue(format!("expected value object, got {}", json)))?;

    let lexical = obj
        .get("v")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| LinkError::UnknownValue(format!("value without 'v': {}", json)))?
        .to_string();
    let tag = obj.get("type").and_then(JsonValue::as_str).unwrap_or_default();

    let value = match tag {
        TYPE_GLOBAL => Value::GlobalId(lexical),
        TYPE_LOCAL => Value::LocalId(lexical),
        TYPE_BOOL => Value::Bool(lexical),
        TYPE_INT32 => Value::Int32(lexical),
        TYPE_INT64 => Value::Int64(lexical),
        TYPE_STRING => Value::Str(lexical),
        TYPE_DATE_TIME => Value::DateTime(lexical),
        TYPE_PRIMITIVE => {
            let datatype = obj
                .get("dt")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| LinkError::UnknownValue(format!("primitive without 'dt': {}", json)))?;
            Value::primitive(lexical, datatype)
        }
        TYPE_LANG_STRING => {
            let lang = obj
                .get("l")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| LinkError::UnknownValue(format!("lang string without 'l': {}", json)))?;
            Value::lang_string(lexical, lang)
        }
        other => {
            return Err(LinkError::UnknownValue(format!("unknown value type '{}'", other)));
        }
    };
    Ok(value)
}

/// Encode a record
pub fn encode_record(record: &Record) -> JsonValue {
    let mut obj = Map::new();
    obj.insert(ID_KEY.to_string(), encode_value(record.id()));
    for (field, values) in record.fields() {
        let encoded = match values.as_slice() {
            [single] => encode_value(single),
            many => JsonValue::Array(many.iter().map(encode_value).collect()),
        };
        obj.insert(field.clone(), encoded);
    }
    JsonValue::Object(obj)
}

/// Decode a record
pub fn decode_record(json: &JsonValue) -> Result<Record> {
    let obj = json
        .as_object()
        .ok_or_else(|| LinkError::UnknownElement(format!("expected record object, got {}", json)))?;

    let id = obj
        .get(ID_KEY)
        .ok_or_else(|| LinkError::UnknownElement("record without '_id'".to_string()))
        .and_then(decode_value)?;

    let mut fields = Fields::new();
    for (field, element) in obj.iter().filter(|(key, _)| key.as_str() != ID_KEY) {
        let values = match element {
            JsonValue::Object(_) => vec![decode_value(element)?],
            JsonValue::Array(items) => items.iter().map(decode_value).collect::<Result<Vec<_>>>()?,
            other => {
                return Err(LinkError::UnknownElement(format!(
                    "field '{}' holds {}, expected object or array",
                    field, other
                )));
            }
        };
        fields.insert(field.clone(), values);
    }

    Record::with_fields(id, fields)
}

/// Encode a slice as a `{ "<id>": <record> }` document
pub fn encode_slice(slice: &DataSlice) -> JsonValue {
    let obj: Map<String, JsonValue> = slice
        .records()
        .map(|record| (record.id_str().to_string(), encode_record(record)))
        .collect();
    JsonValue::Object(obj)
}

/// Decode a `{ "<id>": <record> }` document
pub fn decode_slice(json: &JsonValue) -> Result<DataSlice> {
    let obj = json
        .as_object()
        .ok_or_else(|| LinkError::UnknownElement(format!("expected slice object, got {}", json)))?;
    obj.values().map(decode_record).collect::<Result<DataSlice>>()
}

/// Serialize a slice document to a string
pub fn slice_to_string(slice: &DataSlice) -> String {
    encode_slice(slice).to_string()
}

/// Parse a slice document from a string
pub fn slice_from_str(text: &str) -> Result<DataSlice> {
    let json: JsonValue = serde_json::from_str(text)?;
    decode_slice(&json)
}

/// Decode newline-delimited slice documents and merge them in order
pub fn parse_slice_lines(body: &str) -> Result<DataSlice> {
    let slices = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(slice_from_str)
        .collect::<Result<Vec<_>>>()?;
    Ok(DataSlice::merge(slices))
}
