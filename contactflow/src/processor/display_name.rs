//! Display name derivation.

use super::{PostProcessor, ProcessorError};
use crate::record::{
    PropertyKey, PropertyValue, Record, DISPLAY_NAME, EMAIL_ADDRESSES, FAMILY_NAME, GIVEN_NAME,
};

/// Writes [`DISPLAY_NAME`] for every record.
///
/// Uses "given family" when either name is present, otherwise the first email
/// address, otherwise the record id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayNamePostProcessor;

impl DisplayNamePostProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl PostProcessor for DisplayNamePostProcessor {
    fn name(&self) -> &str {
        "display-name"
    }

    fn reads(&self) -> Vec<PropertyKey> {
        vec![
            GIVEN_NAME.key().clone(),
            FAMILY_NAME.key().clone(),
            EMAIL_ADDRESSES,
        ]
    }

    fn writes(&self) -> Vec<PropertyKey> {
        vec![DISPLAY_NAME.key().clone()]
    }

    fn process(&self, records: &mut [Record]) -> Result<(), ProcessorError> {
        for record in records.iter_mut() {
            let name = display_name(record)?;
            record.set_typed(&DISPLAY_NAME, name);
        }
        Ok(())
    }
}

fn display_name(record: &Record) -> Result<String, ProcessorError> {
    let invalid = |source| ProcessorError::InvalidProperty {
        record: record.id().to_string(),
        source,
    };
    let given = record.get_typed(&GIVEN_NAME).map_err(invalid)?;
    let family = record.get_typed(&FAMILY_NAME).map_err(invalid)?;

    let full = [given, family]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !full.is_empty() {
        return Ok(full);
    }

    if let Some(email) = first_text(record.get(&EMAIL_ADDRESSES)) {
        return Ok(email.to_string());
    }

    Ok(record.id().to_string())
}

fn first_text(value: Option<&PropertyValue>) -> Option<&str> {
    match value? {
        PropertyValue::Text(text) => Some(text),
        PropertyValue::List(items) => items.iter().find_map(|item| item.as_text()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(record: Record) -> String {
        let mut records = vec![record];
        DisplayNamePostProcessor.process(&mut records).unwrap();
        records[0].get_typed(&DISPLAY_NAME).unwrap().unwrap()
    }

    #[test]
    fn test_full_name() {
        let record = Record::contact("1").given_name("Ada").family_name("Lovelace").build();
        assert_eq!(run(record), "Ada Lovelace");
    }

    #[test]
    fn test_single_name_part() {
        assert_eq!(run(Record::contact("1").family_name("Hopper").build()), "Hopper");
    }

    #[test]
    fn test_falls_back_to_email_then_id() {
        let record = Record::contact("1").email_address("ada@example.com").build();
        assert_eq!(run(record), "ada@example.com");
        assert_eq!(run(Record::new("contact-9")), "contact-9");
    }

    #[test]
    fn test_mistyped_name_is_error() {
        let mut records = vec![Record::new("1").with(GIVEN_NAME.key().clone(), 3i64)];
        let err = DisplayNamePostProcessor.process(&mut records).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidProperty { .. }));
    }
}
