//! Object-notation (JSON) form of an address book
//!
//! Object notation has no schema of its own. Reading is conservative about
//! shape (unknown keys and wrongly typed values are rejected) but lets
//! missing fields through, so that the markup validator reports them against
//! the converted output. A key repeated within one object is rejected too,
//! rather than letting the last occurrence win.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value as Json};

use crate::error::{ConvertError, Format, Result};
use crate::model::{AddressBook, Contact, Field, Value};
use crate::schema::{AddressBookSchema, FieldDef, FieldType};

/// Parse object-notation text into the model
pub fn parse_address_book(content: &str, schema: &AddressBookSchema) -> Result<AddressBook> {
    let UniqueKeys(document) = serde_json::from_str(content)
        .map_err(|e| ConvertError::malformed(Format::Notation, e.to_string()))?;

    let top = document
        .as_object()
        .ok_or_else(|| malformed("top level must be an object"))?;

    if let Some(key) = top.keys().find(|k| **k != schema.collection) {
        return Err(malformed(format!("unexpected top-level key {:?}", key)));
    }

    let entries: &[Json] = match top.get(&schema.collection) {
        Some(Json::Array(entries)) => entries.as_slice(),
        Some(Json::Null) | None => &[],
        Some(_) => return Err(malformed(format!("{:?} must be an array", schema.collection))),
    };

    let contacts = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let path = format!("{}[{}]", schema.collection, i);
            let object = entry
                .as_object()
                .ok_or_else(|| malformed(format!("{} must be an object", path)))?;
            Ok(Contact::new(read_fields(object, &schema.fields, &path)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AddressBook::new(contacts))
}

/// A JSON value in which no object repeats a key
struct UniqueKeys(Json);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Json;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Json, E> {
        Ok(Json::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Json, E> {
        Ok(Json::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Json, E> {
        Ok(Json::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Json, E> {
        Ok(Json::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Json, E> {
        Ok(Json::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Json, E> {
        Ok(Json::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Json, E> {
        Ok(Json::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Json, A::Error> {
        let mut items = Vec::new();
        while let Some(UniqueKeys(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Json::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Json, A::Error> {
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if object.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key {:?}", key)));
            }
            let UniqueKeys(value) = map.next_value()?;
            object.insert(key, value);
        }
        Ok(Json::Object(object))
    }
}

fn malformed(message: impl Into<String>) -> ConvertError {
    ConvertError::malformed(Format::Notation, message)
}

fn read_fields(object: &Map<String, Json>, defs: &[FieldDef], path: &str) -> Result<Vec<Field>> {
    if let Some(key) = object.keys().find(|k| !defs.iter().any(|d| &d.name == *k)) {
        return Err(malformed(format!("{}: unexpected key {:?}", path, key)));
    }

    let mut fields = Vec::new();
    for def in defs {
        let path = format!("{}.{}", path, def.name);
        let values = match object.get(&def.name) {
            None | Some(Json::Null) => continue,
            // Arrays on single-valued fields pass through; the markup
            // validator reports the excess occurrences.
            Some(Json::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| read_value(item, def, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?,
            Some(_) if def.max_occurs.is_repeated() => {
                return Err(malformed(format!("{}: repeated field must be an array", path)));
            }
            Some(item) => vec![read_value(item, def, &path)?],
        };
        if !values.is_empty() {
            fields.push(Field::new(def.name.clone(), values));
        }
    }
    Ok(fields)
}

fn read_value(item: &Json, def: &FieldDef, path: &str) -> Result<Value> {
    match (def.field_type, item) {
        (FieldType::String, Json::String(s)) => Ok(Value::Text(s.clone())),
        (FieldType::Integer, Json::Number(n)) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| malformed(format!("{}: {} is not a 64-bit integer", path, n))),
        (FieldType::Boolean, Json::Bool(b)) => Ok(Value::Boolean(*b)),
        (FieldType::Group, Json::Object(object)) => Ok(Value::Group(read_fields(object, &def.fields, path)?)),
        (expected, found) => Err(malformed(format!(
            "{}: expected {}, found {}",
            path,
            type_name(expected),
            json_kind(found)
        ))),
    }
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "a string",
        FieldType::Integer => "an integer",
        FieldType::Boolean => "a boolean",
        FieldType::Group => "an object",
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Build the JSON value of an address book, keys in schema order
pub fn to_json(book: &AddressBook, schema: &AddressBookSchema) -> Json {
    let contacts = book
        .contacts()
        .iter()
        .map(|contact| fields_to_json(contact.fields(), &schema.fields))
        .collect();

    let mut top = Map::new();
    top.insert(schema.collection.clone(), Json::Array(contacts));
    Json::Object(top)
}

fn fields_to_json(fields: &[Field], defs: &[FieldDef]) -> Json {
    let mut object = Map::new();
    for def in defs {
        let Some(field) = fields.iter().find(|f| f.name == def.name) else {
            continue;
        };
        if field.values.is_empty() {
            continue;
        }
        let value = if def.max_occurs.is_repeated() {
            Json::Array(field.values.iter().map(|v| value_to_json(v, def)).collect())
        } else {
            value_to_json(&field.values[0], def)
        };
        object.insert(def.name.clone(), value);
    }
    Json::Object(object)
}

fn value_to_json(value: &Value, def: &FieldDef) -> Json {
    match value {
        Value::Text(s) => Json::String(s.clone()),
        Value::Integer(n) => Json::from(*n),
        Value::Boolean(b) => Json::Bool(*b),
        Value::Group(children) => fields_to_json(children, &def.fields),
    }
}

/// Render the model as indented object notation with a trailing newline
pub fn write_address_book(book: &AddressBook, schema: &AddressBookSchema, indent: usize) -> Result<String> {
    let json = to_json(book, schema);
    let indent = " ".repeat(indent);

    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)?;
    out.push(b'\n');

    String::from_utf8(out).map_err(|e| ConvertError::malformed(Format::Notation, e.to_string()))
}
