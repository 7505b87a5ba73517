//! In-memory address book
//!
//! A neutral carrier between the two serialized forms. Nothing here knows
//! about the schema; field order and shape come from the mapping layer in
//! [`crate::markup`] and [`crate::notation`].

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// Structured value such as a postal address
    Group(Vec<Field>),
}

impl Value {
    /// Scalar value rendered as markup text
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Group(_) => None,
        }
    }
}

/// A named field with one value, or several when the field repeats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Single-valued text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, vec![Value::Text(value.into())])
    }

    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }
}

/// One entry in the address book
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    fields: Vec<Field>,
}

impl Contact {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// First value of a field
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(Field::first)
    }
}

/// The root entity: an ordered list of contacts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressBook {
    contacts: Vec<Contact>,
}

impl AddressBook {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Replace the whole contact sequence
    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

impl From<Vec<Contact>> for AddressBook {
    fn from(contacts: Vec<Contact>) -> Self {
        Self::new(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_lookup() {
        let contact = Contact::new(vec![
            Field::text("name", "Jane Doe"),
            Field::new(
                "email",
                vec![Value::Text("jane@example.com".into()), Value::Text("jd@example.org".into())],
            ),
        ]);

        assert_eq!(contact.value("name"), Some(&Value::Text("Jane Doe".into())));
        assert_eq!(contact.field("email").unwrap().values.len(), 2);
        assert!(contact.field("phone").is_none());
    }

    #[test]
    fn test_set_contacts_replaces_sequence() {
        let mut book = AddressBook::from(vec![Contact::default(), Contact::default()]);
        assert_eq!(book.len(), 2);

        book.set_contacts(vec![Contact::new(vec![Field::text("name", "A")])]);
        assert_eq!(book.len(), 1);
        assert_eq!(book.contacts()[0].value("name"), Some(&Value::Text("A".into())));
    }

    #[test]
    fn test_scalar_text_rendering() {
        assert_eq!(Value::Integer(1987).as_text().as_deref(), Some("1987"));
        assert_eq!(Value::Boolean(false).as_text().as_deref(), Some("false"));
        assert_eq!(Value::Group(vec![]).as_text(), None);
    }
}
