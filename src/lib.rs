//! Address Book Converter
//!
//! Converts address books between XML and JSON and validates them against a
//! fixed schema: a list of contacts, each with declared, typed fields.
//!
//! ## Features
//!
//! - **Schema Validation**: XML documents are checked against the schema
//!   with sequence and cardinality rules
//! - **Validated Conversion**: XML input is validated before conversion;
//!   XML produced from JSON is validated after it is written
//! - **Derived JSON Validity**: a JSON document is valid iff it converts to
//!   valid XML
//! - **Round-Trip Fidelity**: canonical XML converts to JSON and back
//!   byte-for-byte
//!
//! ## Architecture
//!
//! ```text
//!           markup::parse_document          notation::parse_address_book
//! XML ──► Element ──► validator ──► model::AddressBook ◄── JSON
//!                         ▲                 │
//!                         │                 ├──► notation::write_address_book ──► JSON
//!                         └─────────────────┴──► markup::write_address_book ──► XML
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod markup;
pub mod model;
pub mod notation;
pub mod schema;
pub mod validator;

pub use config::AppConfig;
pub use converter::{ConvertOptions, Converter, RoundTripReport};
pub use error::{ConvertError, Format, Result, ValidationFailure, Violation};
pub use model::{AddressBook, Contact, Field, Value};
pub use schema::{AddressBookSchema, FieldDef, FieldType, MaxOccurs};
pub use validator::{ValidationOptions, Validator};
