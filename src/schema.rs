//! Address book schema definition
//!
//! The structural contract every markup address book must satisfy: the root
//! tag, the tag of each contact entry, and the declared contact fields with
//! their types and cardinalities. The default definition is compiled into the
//! binary from `schemas/address_book.json`; another definition file can be
//! loaded with [`AddressBookSchema::from_file`].
//!
//! A definition is checked twice on load: structurally against the embedded
//! meta-schema, then for rules JSON Schema cannot express (unique field
//! names, occurrence bounds, compilable patterns).

use std::collections::HashSet;
use std::path::Path;

use include_dir::{include_dir, Dir};
use jsonschema::JSONSchema;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConvertError, Result};

static SCHEMA_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

const DEFAULT_SCHEMA_FILE: &str = "address_book.json";
const META_SCHEMA_FILE: &str = "definition.meta.json";

/// Type of a contact field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// Structured field with nested fields of its own
    Group,
}

impl FieldType {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Group)
    }
}

/// Upper occurrence bound of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "OccursRepr")]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn allows(&self, count: usize) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count <= *max as usize,
            MaxOccurs::Unbounded => true,
        }
    }

    /// Whether more than one occurrence may appear
    pub fn is_repeated(&self) -> bool {
        !matches!(self, MaxOccurs::Bounded(1))
    }
}

impl std::fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxOccurs::Bounded(n) => write!(f, "{}", n),
            MaxOccurs::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OccursRepr {
    Count(u32),
    Keyword(String),
}

impl TryFrom<OccursRepr> for MaxOccurs {
    type Error = String;

    fn try_from(repr: OccursRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            OccursRepr::Count(n) => Ok(MaxOccurs::Bounded(n)),
            OccursRepr::Keyword(k) if k == "unbounded" => Ok(MaxOccurs::Unbounded),
            OccursRepr::Keyword(k) => Err(format!("invalid max_occurs: {}", k)),
        }
    }
}

/// A declared contact field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    /// Element name in markup and key name in object notation
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default = "default_min_occurs")]
    pub min_occurs: u32,

    #[serde(default = "default_max_occurs")]
    pub max_occurs: MaxOccurs,

    /// Regular expression the whole text of a string field must match
    #[serde(default, rename = "pattern")]
    pattern_source: Option<String>,

    #[serde(skip)]
    pattern: Option<Regex>,

    /// Nested fields of a group
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

fn default_min_occurs() -> u32 {
    1
}

fn default_max_occurs() -> MaxOccurs {
    MaxOccurs::Bounded(1)
}

impl FieldDef {
    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }

    /// Check a scalar's text against this field's type and pattern
    pub fn check_text(&self, text: &str) -> std::result::Result<(), String> {
        if let Some(c) = crate::markup::forbidden_char(text) {
            return Err(format!("value contains character U+{:04X}, which markup cannot hold", c as u32));
        }
        match self.field_type {
            FieldType::String => {
                if let Some(re) = &self.pattern {
                    if !re.is_match(text) {
                        return Err(format!(
                            "value {:?} does not match pattern {:?}",
                            text,
                            self.pattern_source.as_deref().unwrap_or_default()
                        ));
                    }
                }
                Ok(())
            }
            FieldType::Integer => text
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("value {:?} is not an integer", text)),
            FieldType::Boolean => match text.trim() {
                "true" | "false" => Ok(()),
                _ => Err(format!("value {:?} is not a boolean", text)),
            },
            FieldType::Group => Err("group field cannot hold text".to_string()),
        }
    }

    fn prepare(&mut self, path: &str) -> Result<()> {
        let path = format!("{}/{}", path, self.name);

        if let MaxOccurs::Bounded(max) = self.max_occurs {
            if max == 0 {
                return Err(ConvertError::Schema(format!("{}: max_occurs must be at least 1", path)));
            }
            if self.min_occurs > max {
                return Err(ConvertError::Schema(format!(
                    "{}: min_occurs {} exceeds max_occurs {}",
                    path, self.min_occurs, max
                )));
            }
        }

        match self.field_type {
            FieldType::Group => {
                if self.fields.is_empty() {
                    return Err(ConvertError::Schema(format!("{}: group declares no fields", path)));
                }
                if self.pattern_source.is_some() {
                    return Err(ConvertError::Schema(format!("{}: pattern is only allowed on string fields", path)));
                }
                prepare_fields(&mut self.fields, &path)?;
            }
            scalar => {
                if !self.fields.is_empty() {
                    return Err(ConvertError::Schema(format!("{}: scalar field cannot declare nested fields", path)));
                }
                if let Some(source) = &self.pattern_source {
                    if scalar != FieldType::String {
                        return Err(ConvertError::Schema(format!("{}: pattern is only allowed on string fields", path)));
                    }
                    // Pattern facets match the whole value.
                    let anchored = format!("^(?:{})$", source);
                    let re = Regex::new(&anchored)
                        .map_err(|e| ConvertError::Schema(format!("{}: invalid pattern: {}", path, e)))?;
                    self.pattern = Some(re);
                }
            }
        }
        Ok(())
    }
}

fn prepare_fields(fields: &mut [FieldDef], path: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields.iter_mut() {
        if !seen.insert(field.name.clone()) {
            return Err(ConvertError::Schema(format!("{}: duplicate field {:?}", path, field.name)));
        }
        field.prepare(path)?;
    }
    Ok(())
}

/// The fixed address book schema
#[derive(Debug, Clone, Deserialize)]
pub struct AddressBookSchema {
    /// Root element of a markup address book
    pub root: String,
    /// Element wrapping each contact
    pub entry: String,
    /// Top-level key of the contact array in object notation
    pub collection: String,
    /// Declared contact fields, in document order
    pub fields: Vec<FieldDef>,
}

impl AddressBookSchema {
    /// The schema compiled into the binary
    pub fn embedded() -> Result<Self> {
        let content = embedded_file(DEFAULT_SCHEMA_FILE)?;
        Self::from_json_str(content)
    }

    /// Load a schema definition from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Schema(format!("cannot read schema definition {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Loading schema definition");
        Self::from_json_str(&content)
    }

    /// Parse and check a schema definition
    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| ConvertError::Schema(format!("schema definition is not JSON: {}", e)))?;

        check_against_meta_schema(&document)?;

        let mut schema: AddressBookSchema = serde_json::from_value(document)
            .map_err(|e| ConvertError::Schema(format!("invalid schema definition: {}", e)))?;

        if schema.root == schema.entry {
            return Err(ConvertError::Schema(format!(
                "root and entry elements must differ, both are {:?}",
                schema.root
            )));
        }
        let root_path = format!("/{}/{}", schema.root, schema.entry);
        prepare_fields(&mut schema.fields, &root_path)?;

        Ok(schema)
    }

    /// Look up a top-level contact field
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn embedded_file(name: &str) -> Result<&'static str> {
    SCHEMA_DIR
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .ok_or_else(|| ConvertError::Schema(format!("embedded schema file {} is missing", name)))
}

fn check_against_meta_schema(document: &Value) -> Result<()> {
    let meta: Value = serde_json::from_str(embedded_file(META_SCHEMA_FILE)?)
        .map_err(|e| ConvertError::Schema(format!("meta-schema is not JSON: {}", e)))?;
    let compiled = JSONSchema::compile(&meta)
        .map_err(|e| ConvertError::Schema(format!("meta-schema does not compile: {}", e)))?;

    if let Err(errors) = compiled.validate(document) {
        let messages: Vec<String> = errors
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        return Err(ConvertError::Schema(format!(
            "schema definition rejected: {}",
            messages.join("; ")
        )));
    }
    Ok(())
}
