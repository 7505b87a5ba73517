//! Error types for address book conversion and validation

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// The two serialized forms of an address book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Tree-structured markup (XML)
    Markup,
    /// Key-value object notation (JSON)
    Notation,
}

impl Format {
    /// Infer the form of a document from its file extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("xml") {
            Some(Format::Markup)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Format::Notation)
        } else {
            None
        }
    }

    /// File extension used for this form
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Markup => "xml",
            Format::Notation => "json",
        }
    }

    /// The opposite form
    pub fn other(&self) -> Self {
        match self {
            Format::Markup => Format::Notation,
            Format::Notation => Format::Markup,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Markup => write!(f, "XML"),
            Format::Notation => write!(f, "JSON"),
        }
    }
}

/// One schema rule broken by a markup document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending node, e.g. `/AddressBook/Contact[2]/phone`
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Why a markup document was not accepted.
///
/// The boolean validator collapses all of these into `false`; this type keeps
/// the cause for diagnostics.
#[derive(Error, Debug)]
pub enum ValidationFailure {
    #[error("document could not be read: {0}")]
    Unreadable(#[source] std::io::Error),

    #[error("document is not well-formed: {0}")]
    Malformed(String),

    #[error("{} schema violation(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Violations(Vec<Violation>),
}

impl ValidationFailure {
    /// Schema violations, empty for read and parse failures
    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationFailure::Violations(v) => v,
            _ => &[],
        }
    }
}

/// Address book conversion errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Address book not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Invalid XML address book given: {}", .path.display())]
    InvalidDocument {
        path: PathBuf,
        #[source]
        reason: ValidationFailure,
    },

    #[error("Invalid XML address book conversion: {}", .path.display())]
    InvalidConversion {
        path: PathBuf,
        #[source]
        reason: ValidationFailure,
    },

    #[error("Malformed {format} address book: {message}")]
    Malformed { format: Format, message: String },

    #[error("Cannot convert {} to {}: accepted file types are .xml or .json", .input.display(), .output.display())]
    UnsupportedConversion { input: PathBuf, output: PathBuf },

    #[error("Unsupported address book file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ConvertError {
    pub(crate) fn malformed(format: Format, message: impl Into<String>) -> Self {
        ConvertError::Malformed {
            format,
            message: message.into(),
        }
    }

    /// Process exit code for this failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::InvalidDocument { .. } | ConvertError::InvalidConversion { .. } => 1,
            ConvertError::UnsupportedConversion { .. } | ConvertError::UnsupportedFormat(_) => 2,
            ConvertError::MissingInput(_) => 3,
            ConvertError::Malformed { .. }
            | ConvertError::Io(_)
            | ConvertError::Json(_)
            | ConvertError::Xml(_) => 4,
            ConvertError::Schema(_) => 5,
        }
    }
}
