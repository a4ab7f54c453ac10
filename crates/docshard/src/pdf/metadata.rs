//! Document Info dictionary extraction.

use super::text::decode_text_string;
use crate::normalize::sanitize_raw;
use lopdf::{Document, Object};
use serde_json::{Map, Value};

/// Read the Info dictionary into a loosely typed map.
///
/// Keys are the Info entry names with the first letter lowercased
/// (`CreationDate` becomes `creationDate`). `format` carries the PDF version.
/// Values that are neither text, names, numbers nor booleans are dropped.
pub fn extract_info(doc: &Document) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("format".to_string(), Value::String(format!("PDF {}", doc.version)));
    metadata.insert("encrypted".to_string(), Value::Bool(doc.is_encrypted()));

    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return metadata;
    };

    for (key, value) in info.iter() {
        let Some(value) = resolve(doc, value).and_then(info_value) else {
            continue;
        };
        metadata.insert(info_key(key), value);
    }
    metadata
}

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Option<&'a Object> {
    for _ in 0..32 {
        match object {
            Object::Reference(id) => object = doc.get_object(*id).ok()?,
            direct => return Some(direct),
        }
    }
    None
}

fn info_key(raw: &[u8]) -> String {
    let key = String::from_utf8_lossy(raw);
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn info_value(object: &Object) -> Option<Value> {
    match object {
        Object::String(bytes, _) => Some(Value::String(sanitize_raw(&decode_text_string(bytes)))),
        Object::Name(name) => Some(Value::String(String::from_utf8_lossy(name).into_owned())),
        Object::Integer(value) => Some(Value::from(*value)),
        Object::Real(value) => serde_json::Number::from_f64(f64::from(*value)).map(Value::Number),
        Object::Boolean(value) => Some(Value::Bool(*value)),
        _ => None,
    }
}
