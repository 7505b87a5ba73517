//! Conversion and validation tests against fixture address books
//!
//! Fixtures live in `tests/fixtures`; every written document goes to a
//! temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use address_book::{ConvertError, Converter, ValidationFailure};
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn converter() -> Converter {
    Converter::with_embedded_schema().unwrap()
}

// =============================================================================
// Markup -> object notation
// =============================================================================

#[test]
fn test_jane_doe_to_json() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.json");

    converter().markup_to_notation(&fixture("jane.xml"), &output).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written, fs::read_to_string(fixture("jane.json")).unwrap());

    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"contacts": [{"name": "Jane Doe", "phone": "555-1234"}]})
    );
}

#[test]
fn test_full_book_to_json_matches_expected_bytes() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.json");

    converter().markup_to_notation(&fixture("full.xml"), &output).unwrap();

    assert_eq!(fs::read(&output).unwrap(), fs::read(fixture("full.json")).unwrap());
}

#[test]
fn test_schema_violating_markup_is_rejected_before_conversion() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.json");

    let err = converter()
        .markup_to_notation(&fixture("invalid_schema.xml"), &output)
        .unwrap_err();

    match err {
        ConvertError::InvalidDocument { reason, .. } => {
            assert!(reason.violations()[0].message.contains("<name>"));
        }
        other => panic!("Expected InvalidDocument, got {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_malformed_markup_is_an_invalid_document() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.json");

    let err = converter()
        .markup_to_notation(&fixture("malformed.xml"), &output)
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::InvalidDocument {
            reason: ValidationFailure::Malformed(_),
            ..
        }
    ));
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_is_an_io_error() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("missing-dir").join("result.json");

    let err = converter().markup_to_notation(&fixture("jane.xml"), &output).unwrap_err();
    assert!(matches!(err, ConvertError::Io(_)));
}

// =============================================================================
// Object notation -> markup
// =============================================================================

#[test]
fn test_jane_doe_back_to_markup() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.xml");

    converter().notation_to_markup(&fixture("jane.json"), &output).unwrap();

    assert_eq!(fs::read(&output).unwrap(), fs::read(fixture("jane.xml")).unwrap());
}

#[test]
fn test_missing_required_field_fails_after_writing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.xml");

    let err = converter()
        .notation_to_markup(&fixture("missing_name.json"), &output)
        .unwrap_err();

    match &err {
        ConvertError::InvalidConversion { path, reason } => {
            assert_eq!(path, &output);
            assert_eq!(reason.violations().len(), 1);
            assert_eq!(reason.violations()[0].path, "/AddressBook/Contact[1]");
        }
        other => panic!("Expected InvalidConversion, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);

    // The malformed markup is left for inspection.
    let written = fs::read_to_string(&output).unwrap();
    assert!(written.contains("<phone>555-1234</phone>"));
    assert!(!written.contains("<name>"));
}

#[test]
fn test_cardinality_overflow_fails_after_writing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.xml");

    let err = converter()
        .notation_to_markup(&fixture("too_many_phones.json"), &output)
        .unwrap_err();

    assert!(matches!(err, ConvertError::InvalidConversion { .. }));
    assert_eq!(fs::read_to_string(&output).unwrap().matches("<phone>").count(), 2);
}

#[test]
fn test_control_characters_fail_conversion_to_markup() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("control.json");
    let output = dir.path().join("result.xml");
    fs::write(&input, r#"{"contacts":[{"name":"A\u0000B\u0007","phone":"1"}]}"#).unwrap();

    let converter = converter();
    let err = converter.notation_to_markup(&input, &output).unwrap_err();
    assert!(
        matches!(err, ConvertError::InvalidConversion { .. }),
        "Expected InvalidConversion, got {:?}",
        err
    );
    assert!(!converter.validate_markup(&output));
    assert!(!converter.validate_notation(&input));
}

#[test]
fn test_duplicate_json_keys_are_malformed() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("duplicate.json");
    let output = dir.path().join("result.xml");
    fs::write(&input, r#"{"contacts":[{"name":"A","name":"B","phone":"1"}]}"#).unwrap();

    let err = converter().notation_to_markup(&input, &output).unwrap_err();
    assert!(matches!(err, ConvertError::Malformed { .. }));
    assert!(!output.exists());
}

#[test]
fn test_mistyped_json_is_malformed_and_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.xml");

    let err = converter()
        .notation_to_markup(&fixture("malformed.json"), &output)
        .unwrap_err();

    assert!(matches!(err, ConvertError::Malformed { .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(!output.exists());
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_round_trip_reproduces_markup_byte_for_byte() {
    let dir = tempdir().unwrap();
    let converter = converter();

    for name in ["jane.xml", "full.xml"] {
        let json = dir.path().join(format!("{}.json", name));
        let xml = dir.path().join(name);

        converter.convert(&fixture(name), &json).unwrap();
        converter.convert(&json, &xml).unwrap();

        assert_eq!(
            fs::read(&xml).unwrap(),
            fs::read(fixture(name)).unwrap(),
            "round trip changed {}",
            name
        );
    }
}

#[test]
fn test_round_trip_report_on_canonical_documents() {
    let converter = converter();
    for name in ["jane.xml", "full.xml", "jane.json", "full.json"] {
        let report = converter.round_trip(&fixture(name)).unwrap();
        assert!(report.identical, "{} differs:\n{}", name, report.diff);
        assert!(report.diff.is_empty());
    }
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_markup_validation_agrees_with_fixtures() {
    let converter = converter();
    assert!(converter.validate_markup(&fixture("jane.xml")));
    assert!(converter.validate_markup(&fixture("full.xml")));
    assert!(!converter.validate_markup(&fixture("invalid_schema.xml")));
    assert!(!converter.validate_markup(&fixture("malformed.xml")));
    assert!(!converter.validate_markup(&fixture("jane.json")));
}

#[test]
fn test_notation_validity_is_derived_from_conversion() {
    let converter = converter();
    assert!(converter.validate_notation(&fixture("jane.json")));
    assert!(converter.validate_notation(&fixture("full.json")));
    assert!(!converter.validate_notation(&fixture("missing_name.json")));
    assert!(!converter.validate_notation(&fixture("too_many_phones.json")));
    assert!(!converter.validate_notation(&fixture("malformed.json")));

    // Each verdict matches a real conversion into a kept file.
    let dir = tempdir().unwrap();
    for name in ["jane.json", "missing_name.json", "malformed.json"] {
        let output = dir.path().join(format!("{}.xml", name));
        let converted = converter.notation_to_markup(&fixture(name), &output).is_ok();
        assert_eq!(converted, converter.validate_notation(&fixture(name)), "{}", name);
    }
}

#[test]
fn test_notation_check_leaves_no_scratch_files() {
    let scratch = tempdir().unwrap();
    let converter = converter();

    for name in ["jane.json", "full.json", "missing_name.json", "too_many_phones.json", "malformed.json"] {
        let _ = converter.check_notation_in(&fixture(name), scratch.path());
        let left: Vec<_> = fs::read_dir(scratch.path()).unwrap().collect();
        assert!(left.is_empty(), "{} left {} scratch file(s)", name, left.len());
    }
}

#[test]
fn test_missing_input_fails_everywhere() {
    let dir = tempdir().unwrap();
    let converter = converter();
    let absent_xml = dir.path().join("absent.xml");
    let absent_json = dir.path().join("absent.json");
    let output_json = dir.path().join("out.json");
    let output_xml = dir.path().join("out.xml");

    assert!(matches!(
        converter.markup_to_notation(&absent_xml, &output_json),
        Err(ConvertError::MissingInput(_))
    ));
    assert!(matches!(
        converter.notation_to_markup(&absent_json, &output_xml),
        Err(ConvertError::MissingInput(_))
    ));
    assert!(matches!(converter.validate(&absent_xml), Err(ConvertError::MissingInput(_))));
    assert!(matches!(converter.check_notation(&absent_json), Err(ConvertError::MissingInput(_))));
    assert!(matches!(converter.round_trip(&absent_xml), Err(ConvertError::MissingInput(_))));
    assert!(!converter.validate_markup(&absent_xml));
    assert!(!converter.validate_notation(&absent_json));

    assert!(!output_json.exists());
    assert!(!output_xml.exists());
}
