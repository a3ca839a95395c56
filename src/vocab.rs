//! IRIs and reserved names shared by the data model and codecs

pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const HTTP_STATUS_CODE: &str = "http://www.w3.org/2011/http#statusCode";

pub const LIBRO_TRANSLATED_OBJECT: &str = "https://ns.ontola.io/libro/TranslatedObject";
pub const LIBRO_VALUE: &str = "https://ns.ontola.io/libro/value";
pub const LIBRO_LANGUAGE: &str = "https://ns.ontola.io/libro/language";

/// Graph carrying current-state statements
pub const SUPPLANT_GRAPH: &str = "http://purl.org/linked-delta/supplant";
/// Graph carrying transport metadata, never ingested
pub const META_GRAPH: &str = "http://purl.org/link-lib/meta";

/// Hextuple datatype markers for resource objects
pub const HEX_GLOBAL_ID: &str = "globalId";
pub const HEX_LOCAL_ID: &str = "localId";

/// Prefix of scoped (blank node) identifiers
pub const LOCAL_ID_PREFIX: &str = "_:";

// Reserved field keys used by the multilingual split
pub const FIELD_IDS: &str = "_ids";
pub const FIELD_CANONICAL: &str = "_canonical";
pub const FIELD_LANGUAGE: &str = "_language";
pub const FIELD_TRANSLATIONS: &str = "_translations";

/// Whether a field key is one of the multilingual sentinels
pub fn is_reserved_field(key: &str) -> bool {
    matches!(
        key,
        FIELD_IDS | FIELD_CANONICAL | FIELD_LANGUAGE | FIELD_TRANSLATIONS
    )
}
