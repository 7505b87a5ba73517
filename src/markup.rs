//! Markup (XML) form of an address book
//!
//! Reading goes through a small element tree so the validator and the model
//! mapping share one parser. Writing walks the model directly and produces
//! the canonical layout: an XML declaration, space indentation, one element
//! per field value, a trailing newline.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ConvertError, Format, Result};
use crate::model::{AddressBook, Contact, Field, Value};
use crate::schema::{AddressBookSchema, FieldDef, FieldType};

/// A parsed markup element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attribute names, namespace and schema-instance declarations excluded
    pub attributes: Vec<String>,
    /// Default namespace declared on this element, if any
    pub namespace: Option<String>,
    pub children: Vec<Element>,
    /// Character data directly inside this element, unescaped
    pub text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = utf8(start.name().as_ref())?.to_string();

        let mut attributes = Vec::new();
        let mut namespace = None;
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = utf8(attr.key.as_ref())?;
            let value = attr.unescape_value()?;
            ensure_xml_chars(&value, &name)?;
            if key == "xmlns" {
                namespace = Some(value.into_owned());
                continue;
            }
            if key.starts_with("xmlns:") || key.starts_with("xsi:") {
                continue;
            }
            attributes.push(key.to_string());
        }

        Ok(Self {
            name,
            attributes,
            namespace,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Whether the element holds non-whitespace character data
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// First character in `text` that XML 1.0 does not allow in a document
pub fn forbidden_char(text: &str) -> Option<char> {
    text.chars().find(|&c| match c {
        '\t' | '\n' | '\r' => false,
        '\u{FFFE}' | '\u{FFFF}' => true,
        c => c < '\u{20}',
    })
}

fn ensure_xml_chars(text: &str, element: &str) -> Result<()> {
    match forbidden_char(text) {
        Some(c) => Err(ConvertError::malformed(
            Format::Markup,
            format!("character U+{:04X} is not allowed in <{}>", c as u32, element),
        )),
        None => Ok(()),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| ConvertError::malformed(Format::Markup, e.to_string()))
}

/// Parse a markup document into its root element
pub fn parse_document(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                ensure_single_root(&root, &stack)?;
                stack.push(Element::open(&e)?);
            }
            Event::Empty(e) => {
                ensure_single_root(&root, &stack)?;
                let element = Element::open(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ConvertError::malformed(Format::Markup, "closing tag without matching opening tag")
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(quick_xml::Error::from)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| ConvertError::malformed(Format::Markup, e.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConvertError::malformed(
            Format::Markup,
            format!("unexpected end of document inside <{}>", open.name),
        ));
    }
    root.ok_or_else(|| ConvertError::malformed(Format::Markup, "document has no root element"))
}

fn ensure_single_root(root: &Option<Element>, stack: &[Element]) -> Result<()> {
    if stack.is_empty() && root.is_some() {
        return Err(ConvertError::malformed(Format::Markup, "content after the root element"));
    }
    Ok(())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            ensure_xml_chars(text, &parent.name)?;
            parent.text.push_str(text);
        }
        None if text.trim().is_empty() => {}
        None => {
            return Err(ConvertError::malformed(Format::Markup, "text outside the root element"));
        }
    }
    Ok(())
}

/// Map a parsed document onto the model.
///
/// Expects a document that already passed validation; anything the schema
/// does not declare is still rejected rather than dropped.
pub fn read_address_book(root: &Element, schema: &AddressBookSchema) -> Result<AddressBook> {
    if root.name != schema.root {
        return Err(ConvertError::malformed(
            Format::Markup,
            format!("expected root <{}>, found <{}>", schema.root, root.name),
        ));
    }

    let contacts = root
        .children
        .iter()
        .map(|child| {
            if child.name != schema.entry {
                return Err(ConvertError::malformed(
                    Format::Markup,
                    format!("unexpected <{}> in <{}>", child.name, schema.root),
                ));
            }
            Ok(Contact::new(read_fields(child, &schema.fields)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AddressBook::new(contacts))
}

fn read_fields(element: &Element, defs: &[FieldDef]) -> Result<Vec<Field>> {
    if let Some(unknown) = element
        .children
        .iter()
        .find(|c| !defs.iter().any(|d| d.name == c.name))
    {
        return Err(ConvertError::malformed(
            Format::Markup,
            format!("unexpected <{}> in <{}>", unknown.name, element.name),
        ));
    }

    let mut fields = Vec::new();
    for def in defs {
        let values = element
            .children
            .iter()
            .filter(|c| c.name == def.name)
            .map(|c| read_value(c, def))
            .collect::<Result<Vec<_>>>()?;
        if !values.is_empty() {
            fields.push(Field::new(def.name.clone(), values));
        }
    }
    Ok(fields)
}

fn read_value(element: &Element, def: &FieldDef) -> Result<Value> {
    let bad = |expected: &str| {
        ConvertError::malformed(
            Format::Markup,
            format!("<{}> holds {:?}, expected {}", def.name, element.text, expected),
        )
    };
    match def.field_type {
        FieldType::String => Ok(Value::Text(element.text.clone())),
        FieldType::Integer => element
            .text
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| bad("an integer")),
        FieldType::Boolean => match element.text.trim() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(bad("a boolean")),
        },
        FieldType::Group => Ok(Value::Group(read_fields(element, &def.fields)?)),
    }
}

/// Parse markup text straight into the model
pub fn parse_address_book(content: &str, schema: &AddressBookSchema) -> Result<AddressBook> {
    let root = parse_document(content)?;
    read_address_book(&root, schema)
}

/// Render the model as indented markup
pub fn write_address_book(book: &AddressBook, schema: &AddressBookSchema, indent: usize) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = schema.root.as_str();
    if book.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(root)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(root)))?;
        for contact in book.contacts() {
            write_record(&mut writer, &schema.entry, contact.fields())?;
        }
        writer.write_event(Event::End(BytesEnd::new(root)))?;
    }

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| ConvertError::malformed(Format::Markup, e.to_string()))
}

fn write_record(writer: &mut Writer<Vec<u8>>, tag: &str, fields: &[Field]) -> Result<()> {
    if fields.iter().all(|f| f.values.is_empty()) {
        writer.write_event(Event::Empty(BytesStart::new(tag)))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for field in fields {
        for value in &field.values {
            match value {
                Value::Group(children) => write_record(writer, &field.name, children)?,
                scalar => {
                    let text = scalar.as_text().unwrap_or_default();
                    writer.write_event(Event::Start(BytesStart::new(field.name.as_str())))?;
                    // Only markup-significant characters are escaped so
                    // quotes and apostrophes come back byte-for-byte.
                    writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))))?;
                    writer.write_event(Event::End(BytesEnd::new(field.name.as_str())))?;
                }
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AddressBookSchema {
        AddressBookSchema::embedded().unwrap()
    }

    const JANE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<AddressBook>
  <Contact>
    <name>Jane Doe</name>
    <phone>555-1234</phone>
  </Contact>
</AddressBook>
";

    #[test]
    fn test_parse_tree() {
        let root = parse_document(JANE).unwrap();
        assert_eq!(root.name, "AddressBook");
        assert_eq!(root.children.len(), 1);
        let contact = &root.children[0];
        assert_eq!(contact.children[0].name, "name");
        assert_eq!(contact.children[0].text, "Jane Doe");
        assert!(!contact.has_text());
    }

    #[test]
    fn test_write_matches_canonical_layout() {
        let book = AddressBook::new(vec![Contact::new(vec![
            Field::text("name", "Jane Doe"),
            Field::text("phone", "555-1234"),
        ])]);
        let xml = write_address_book(&book, &schema(), 2).unwrap();
        assert_eq!(xml, JANE);
    }

    #[test]
    fn test_empty_book_is_self_closing() {
        let xml = write_address_book(&AddressBook::default(), &schema(), 2).unwrap();
        assert_eq!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<AddressBook/>\n");
        assert!(parse_address_book(&xml, &schema()).unwrap().is_empty());
    }

    #[test]
    fn test_typed_and_nested_fields() {
        let xml = "<AddressBook><Contact><name>O'Brien &amp; Co</name><phone>1</phone>\
                   <address><street>1 Main St</street><city>Springfield</city></address>\
                   <birth_year> 1987 </birth_year><favorite>true</favorite></Contact></AddressBook>";
        let book = parse_address_book(xml, &schema()).unwrap();
        let contact = &book.contacts()[0];

        assert_eq!(contact.value("name"), Some(&Value::Text("O'Brien & Co".into())));
        assert_eq!(contact.value("birth_year"), Some(&Value::Integer(1987)));
        assert_eq!(contact.value("favorite"), Some(&Value::Boolean(true)));
        match contact.value("address") {
            Some(Value::Group(fields)) => {
                assert_eq!(fields[0], Field::text("street", "1 Main St"));
                assert_eq!(fields[1], Field::text("city", "Springfield"));
            }
            other => panic!("Expected group, got {:?}", other),
        }

        let written = write_address_book(&book, &schema(), 2).unwrap();
        assert!(written.contains("<name>O'Brien &amp; Co</name>"));
        assert!(written.contains("    <address>\n      <street>1 Main St</street>"));
    }

    #[test]
    fn test_fields_follow_schema_order() {
        let xml = "<AddressBook><Contact><phone>1</phone><name>A</name></Contact></AddressBook>";
        let book = parse_address_book(xml, &schema()).unwrap();
        let names: Vec<_> = book.contacts()[0].fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "phone"]);
    }

    #[test]
    fn test_unknown_element_is_rejected() {
        let xml = "<AddressBook><Contact><name>A</name><nickname>B</nickname></Contact></AddressBook>";
        let err = parse_address_book(xml, &schema()).unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { format: Format::Markup, .. }));
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_document("<AddressBook><Contact></AddressBook>").is_err());
        assert!(parse_document("<AddressBook>").is_err());
        assert!(parse_document("<AddressBook/><AddressBook/>").is_err());
        assert!(parse_document("stray <AddressBook/>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_namespace_attributes_are_ignored() {
        let root = parse_document(
            r#"<AddressBook xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="ad.xsd" id="1"/>"#,
        )
        .unwrap();
        assert_eq!(root.attributes, vec!["id".to_string()]);
        assert!(root.namespace.is_none());

        let root = parse_document(r#"<AddressBook xmlns="urn:other"/>"#).unwrap();
        assert!(root.attributes.is_empty());
        assert_eq!(root.namespace.as_deref(), Some("urn:other"));
    }

    #[test]
    fn test_control_characters_are_not_well_formed() {
        for xml in [
            "<AddressBook><Contact><name>A\u{0}B</name></Contact></AddressBook>",
            "<AddressBook><Contact><name>bell\u{7}</name></Contact></AddressBook>",
            "<AddressBook id=\"\u{1}\"/>",
        ] {
            let err = parse_document(xml).unwrap_err();
            assert!(err.to_string().contains("is not allowed"), "{}", err);
        }

        let root = parse_document("<AddressBook>\t\r\n</AddressBook>").unwrap();
        assert!(!root.has_text());
    }

    #[test]
    fn test_forbidden_char() {
        assert_eq!(forbidden_char("plain\ttext\r\n"), None);
        assert_eq!(forbidden_char("A\u{0}B"), Some('\u{0}'));
        assert_eq!(forbidden_char("\u{1F}"), Some('\u{1F}'));
        assert_eq!(forbidden_char("\u{FFFF}"), Some('\u{FFFF}'));
        assert_eq!(forbidden_char("caf\u{E9} \u{1F600}"), None);
    }
}
