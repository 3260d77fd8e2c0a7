//! Contact attributes and a builder for contact records.

use super::{PropertyKey, PropertyValue, Record, RecordId, TypedKey};

/// Given (first) name.
pub const GIVEN_NAME: TypedKey<String> = TypedKey::base("given_name");

/// Family (last) name.
pub const FAMILY_NAME: TypedKey<String> = TypedKey::base("family_name");

/// Organization name.
pub const ORGANIZATION: TypedKey<String> = TypedKey::base("organization");

/// Phone number fields. Entries may be plain text or labelled maps.
pub const PHONE_NUMBERS: PropertyKey = PropertyKey::base("phone_numbers");

/// Email address fields. Entries may be plain text or labelled maps.
pub const EMAIL_ADDRESSES: PropertyKey = PropertyKey::base("email_addresses");

/// Human-readable name derived by the display name processor.
pub const DISPLAY_NAME: TypedKey<String> = TypedKey::derived("display", "name");

/// Builds a contact [`Record`] from base attributes.
///
/// ```
/// use contactflow::record::Record;
///
/// let record = Record::contact("1")
///     .given_name("Ada")
///     .family_name("Lovelace")
///     .phone_number("555-0100")
///     .email_address("ada@example.com")
///     .build();
/// assert_eq!(record.id().as_str(), "1");
/// ```
#[derive(Debug)]
pub struct ContactBuilder {
    record: Record,
    phone_numbers: Vec<PropertyValue>,
    email_addresses: Vec<PropertyValue>,
}

impl ContactBuilder {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            record: Record::new(id),
            phone_numbers: Vec::new(),
            email_addresses: Vec::new(),
        }
    }

    pub fn given_name(mut self, name: impl Into<String>) -> Self {
        self.record.set_typed(&GIVEN_NAME, name.into());
        self
    }

    pub fn family_name(mut self, name: impl Into<String>) -> Self {
        self.record.set_typed(&FAMILY_NAME, name.into());
        self
    }

    pub fn organization(mut self, name: impl Into<String>) -> Self {
        self.record.set_typed(&ORGANIZATION, name.into());
        self
    }

    pub fn phone_number(mut self, number: impl Into<String>) -> Self {
        self.phone_numbers.push(PropertyValue::Text(number.into()));
        self
    }

    pub fn email_address(mut self, address: impl Into<String>) -> Self {
        self.email_addresses.push(PropertyValue::Text(address.into()));
        self
    }

    /// Finishes the record. Empty phone/email lists are left unset.
    pub fn build(mut self) -> Record {
        if !self.phone_numbers.is_empty() {
            self.record
                .set(PHONE_NUMBERS, PropertyValue::List(self.phone_numbers));
        }
        if !self.email_addresses.is_empty() {
            self.record
                .set(EMAIL_ADDRESSES, PropertyValue::List(self.email_addresses));
        }
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_base_properties() {
        let record = ContactBuilder::new("1")
            .given_name("Grace")
            .family_name("Hopper")
            .phone_number("555-0100")
            .phone_number("555-0101")
            .build();

        assert_eq!(record.get_typed(&GIVEN_NAME), Ok(Some("Grace".to_string())));
        assert_eq!(record.get_typed(&FAMILY_NAME), Ok(Some("Hopper".to_string())));
        assert!(matches!(
            record.get(&PHONE_NUMBERS),
            Some(PropertyValue::List(items)) if items.len() == 2
        ));
        assert!(record.get(&EMAIL_ADDRESSES).is_none());
    }
}
