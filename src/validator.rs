//! Markup schema validation
//!
//! Checks a markup address book against [`AddressBookSchema`] with XSD
//! `sequence` semantics: declared fields appear in order, each run of equal
//! elements stays within its occurrence bounds, and nothing undeclared is
//! left over.
//!
//! [`Validator::validate_markup`] keeps the plain boolean contract. The
//! `check_*` methods return the underlying [`ValidationFailure`].

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ValidationFailure, Violation};
use crate::markup::{self, Element};
use crate::schema::{AddressBookSchema, FieldDef};

/// Validator behaviour, fixed at construction
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
    /// Report failures at `warn` level instead of `debug`
    pub log_failures: bool,
}

/// Validates markup documents against a fixed schema
#[derive(Debug, Clone)]
pub struct Validator {
    schema: AddressBookSchema,
    options: ValidationOptions,
}

impl Validator {
    pub fn new(schema: AddressBookSchema, options: ValidationOptions) -> Self {
        Self { schema, options }
    }

    pub fn schema(&self) -> &AddressBookSchema {
        &self.schema
    }

    /// Whether the file at `path` is a valid markup address book.
    ///
    /// Read errors, parse errors and schema violations all yield `false`.
    pub fn validate_markup(&self, path: &Path) -> bool {
        self.check_markup(path).is_ok()
    }

    /// Validate a markup file, keeping the cause of failure
    pub fn check_markup(&self, path: &Path) -> Result<(), ValidationFailure> {
        self.read_valid_markup(path).map(|_| ())
    }

    /// Read a markup file once and hand back its parsed root if it is valid
    pub fn read_valid_markup(&self, path: &Path) -> Result<Element, ValidationFailure> {
        let result = std::fs::read_to_string(path)
            .map_err(ValidationFailure::Unreadable)
            .and_then(|content| self.parse_valid(&content));

        if let Err(failure) = &result {
            self.report(path, failure);
        }
        result
    }

    /// Validate markup text held in memory
    pub fn check_markup_str(&self, content: &str) -> Result<(), ValidationFailure> {
        self.parse_valid(content).map(|_| ())
    }

    fn parse_valid(&self, content: &str) -> Result<Element, ValidationFailure> {
        let root = markup::parse_document(content).map_err(|e| ValidationFailure::Malformed(e.to_string()))?;
        let violations = self.violations(&root);
        if violations.is_empty() {
            Ok(root)
        } else {
            Err(ValidationFailure::Violations(violations))
        }
    }

    /// Every schema rule the parsed document breaks, in document order
    pub fn violations(&self, root: &Element) -> Vec<Violation> {
        let mut out = Vec::new();
        let schema = &self.schema;
        let path = format!("/{}", root.name);

        if root.name != schema.root {
            out.push(Violation::new(
                path,
                format!("expected root element <{}>, found <{}>", schema.root, root.name),
            ));
            return out;
        }
        check_container(root, &path, &mut out);

        let mut index = 0;
        for child in &root.children {
            if child.name == schema.entry {
                index += 1;
                let child_path = format!("{}/{}[{}]", path, child.name, index);
                check_record(child, &schema.fields, &child_path, &mut out);
            } else {
                out.push(Violation::new(
                    format!("{}/{}", path, child.name),
                    format!("unexpected element <{}>, expected <{}>", child.name, schema.entry),
                ));
            }
        }
        out
    }

    fn report(&self, path: &Path, failure: &ValidationFailure) {
        if self.options.log_failures {
            warn!(path = %path.display(), error = %failure, "Could not validate address book");
            for violation in failure.violations() {
                warn!(at = %violation.path, "{}", violation.message);
            }
        } else {
            debug!(path = %path.display(), error = %failure, "Could not validate address book");
        }
    }
}

fn check_attributes(element: &Element, path: &str, out: &mut Vec<Violation>) {
    // Declared elements have no namespace; xmlns="" is the only accepted default.
    if let Some(namespace) = element.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        out.push(Violation::new(
            path,
            format!("element <{}> is in namespace {:?}, expected no namespace", element.name, namespace),
        ));
    }
    for name in &element.attributes {
        out.push(Violation::new(path, format!("unexpected attribute {:?}", name)));
    }
}

fn check_container(element: &Element, path: &str, out: &mut Vec<Violation>) {
    check_attributes(element, path, out);
    if element.has_text() {
        out.push(Violation::new(
            path,
            format!("unexpected text {:?}", element.text.trim()),
        ));
    }
}

fn check_record(element: &Element, defs: &[FieldDef], path: &str, out: &mut Vec<Violation>) {
    check_container(element, path, out);

    let children = &element.children;
    let mut pos = 0;
    for def in defs {
        let start = pos;
        while pos < children.len() && children[pos].name == def.name {
            pos += 1;
        }
        let run = &children[start..pos];

        if run.len() < def.min_occurs as usize {
            let message = if run.is_empty() {
                format!("missing required element <{}>", def.name)
            } else {
                format!(
                    "<{}> occurs {} time(s), at least {} required",
                    def.name,
                    run.len(),
                    def.min_occurs
                )
            };
            out.push(Violation::new(path, message));
        }
        if !def.max_occurs.allows(run.len()) {
            out.push(Violation::new(
                path,
                format!(
                    "<{}> occurs {} time(s), at most {} allowed",
                    def.name,
                    run.len(),
                    def.max_occurs
                ),
            ));
        }

        for (i, child) in run.iter().enumerate() {
            let child_path = if def.max_occurs.is_repeated() {
                format!("{}/{}[{}]", path, def.name, i + 1)
            } else {
                format!("{}/{}", path, def.name)
            };
            check_field(child, def, &child_path, out);
        }
    }

    for child in &children[pos..] {
        let message = if defs.iter().any(|d| d.name == child.name) {
            format!("element <{}> is out of order", child.name)
        } else {
            format!("unexpected element <{}>", child.name)
        };
        out.push(Violation::new(format!("{}/{}", path, child.name), message));
    }
}

fn check_field(element: &Element, def: &FieldDef, path: &str, out: &mut Vec<Violation>) {
    if !def.field_type.is_scalar() {
        check_record(element, &def.fields, path, out);
        return;
    }

    check_attributes(element, path, out);
    if let Some(child) = element.children.first() {
        out.push(Violation::new(
            path,
            format!("<{}> must hold text, found element <{}>", def.name, child.name),
        ));
    } else if let Err(message) = def.check_text(&element.text) {
        out.push(Violation::new(path, message));
    }
}
