//! Address book conversion
//!
//! Markup input must pass validation before it seeds the model. Object
//! notation has no schema, so its input is deserialized first and the markup
//! it produces must pass validation after being written. Object-notation
//! validity is therefore defined by conversion: see
//! [`Converter::validate_notation`].

use std::fs;
use std::path::{Path, PathBuf};

use similar::TextDiff;
use tracing::{debug, info};

use crate::error::{ConvertError, Format, Result};
use crate::model::AddressBook;
use crate::schema::AddressBookSchema;
use crate::validator::{ValidationOptions, Validator};
use crate::{markup, notation};

/// Converter behaviour, fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    /// Spaces per indentation level in written documents
    pub indent: usize,
    pub validation: ValidationOptions,
    /// Delete markup output that fails post-conversion validation
    pub remove_invalid_output: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            validation: ValidationOptions::default(),
            remove_invalid_output: false,
        }
    }
}

/// Outcome of converting a document to the other form and back
#[derive(Debug, Clone)]
pub struct RoundTripReport {
    pub input: PathBuf,
    pub format: Format,
    /// Whether the final document is byte-identical to the input
    pub identical: bool,
    /// Unified diff from input to final document, empty when identical
    pub diff: String,
}

/// Converts address books between markup and object notation
#[derive(Debug, Clone)]
pub struct Converter {
    validator: Validator,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(schema: AddressBookSchema, options: ConvertOptions) -> Self {
        Self {
            validator: Validator::new(schema, options.validation),
            options,
        }
    }

    /// Converter over the embedded schema with default options
    pub fn with_embedded_schema() -> Result<Self> {
        Ok(Self::new(AddressBookSchema::embedded()?, ConvertOptions::default()))
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn schema(&self) -> &AddressBookSchema {
        self.validator.schema()
    }

    /// Convert a markup address book to object notation
    pub fn markup_to_notation(&self, input: &Path, output: &Path) -> Result<()> {
        ensure_input_exists(input)?;

        let root = self
            .validator
            .read_valid_markup(input)
            .map_err(|reason| ConvertError::InvalidDocument {
                path: input.to_path_buf(),
                reason,
            })?;

        let book = markup::read_address_book(&root, self.schema())?;
        let json = notation::write_address_book(&book, self.schema(), self.options.indent)?;
        fs::write(output, json)?;

        info!(
            input = %input.display(),
            output = %output.display(),
            contacts = book.len(),
            "Converted XML address book to JSON"
        );
        Ok(())
    }

    /// Convert an object-notation address book to markup
    pub fn notation_to_markup(&self, input: &Path, output: &Path) -> Result<()> {
        ensure_input_exists(input)?;

        let book = self.read_notation(input)?;
        let xml = markup::write_address_book(&book, self.schema(), self.options.indent)?;
        fs::write(output, xml)?;

        if let Err(reason) = self.validator.check_markup(output) {
            if self.options.remove_invalid_output {
                debug!(output = %output.display(), "Removing invalid conversion output");
                fs::remove_file(output)?;
            }
            return Err(ConvertError::InvalidConversion {
                path: output.to_path_buf(),
                reason,
            });
        }

        info!(
            input = %input.display(),
            output = %output.display(),
            contacts = book.len(),
            "Converted JSON address book to XML"
        );
        Ok(())
    }

    /// Convert in the direction given by the file extensions
    pub fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        match (Format::from_path(input), Format::from_path(output)) {
            (Some(Format::Markup), Some(Format::Notation)) => self.markup_to_notation(input, output),
            (Some(Format::Notation), Some(Format::Markup)) => self.notation_to_markup(input, output),
            _ => Err(ConvertError::UnsupportedConversion {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
            }),
        }
    }

    /// Whether the file at `path` is a valid markup address book
    pub fn validate_markup(&self, path: &Path) -> bool {
        self.validator.validate_markup(path)
    }

    /// Whether the file at `path` is a valid object-notation address book,
    /// i.e. whether it converts to markup that passes validation
    pub fn validate_notation(&self, path: &Path) -> bool {
        self.check_notation(path).is_ok()
    }

    /// Convert an object-notation document into a scratch file and report
    /// why the conversion failed, if it did
    pub fn check_notation(&self, path: &Path) -> Result<()> {
        self.check_notation_in(path, &std::env::temp_dir())
    }

    /// [`Converter::check_notation`] with its scratch file placed in `scratch_dir`
    pub fn check_notation_in(&self, path: &Path, scratch_dir: &Path) -> Result<()> {
        ensure_input_exists(path)?;

        // Removed on drop, whichever way the conversion ends.
        let scratch = tempfile::Builder::new()
            .prefix("address-book-")
            .suffix(".xml")
            .tempfile_in(scratch_dir)?;
        debug!(scratch = %scratch.path().display(), "Validating JSON address book through conversion");

        self.notation_to_markup(path, scratch.path())
    }

    /// Validate a document of either form, chosen by its extension
    pub fn validate(&self, path: &Path) -> Result<bool> {
        ensure_input_exists(path)?;
        match Format::from_path(path) {
            Some(Format::Markup) => Ok(self.validate_markup(path)),
            Some(Format::Notation) => Ok(self.validate_notation(path)),
            None => Err(ConvertError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Convert a document to the other form and back, comparing the result
    /// with the input byte-for-byte
    pub fn round_trip(&self, input: &Path) -> Result<RoundTripReport> {
        ensure_input_exists(input)?;
        let format = Format::from_path(input).ok_or_else(|| ConvertError::UnsupportedFormat(input.to_path_buf()))?;

        let scratch = tempfile::tempdir()?;
        let there = scratch.path().join(format!("converted.{}", format.other().extension()));
        let back = scratch.path().join(format!("restored.{}", format.extension()));

        self.convert(input, &there)?;
        self.convert(&there, &back)?;

        let original = fs::read_to_string(input)?;
        let restored = fs::read_to_string(&back)?;
        let identical = original == restored;
        let diff = if identical {
            String::new()
        } else {
            TextDiff::from_lines(&original, &restored)
                .unified_diff()
                .header("original", "round-trip")
                .to_string()
        };

        debug!(input = %input.display(), identical, "Round trip finished");
        Ok(RoundTripReport {
            input: input.to_path_buf(),
            format,
            identical,
            diff,
        })
    }

    fn read_notation(&self, path: &Path) -> Result<AddressBook> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConvertError::malformed(Format::Notation, e.to_string()))?;
        notation::parse_address_book(&content, self.schema())
    }
}

fn ensure_input_exists(input: &Path) -> Result<()> {
    if input.as_os_str().is_empty() || !input.is_file() {
        return Err(ConvertError::MissingInput(input.to_path_buf()));
    }
    Ok(())
}
