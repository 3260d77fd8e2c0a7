//! Contact field statistics.
//!
//! [`StatisticsPostProcessor`] counts the phone number and email address
//! fields on every record and stores the counts under two derived keys:
//!
//! - [`PHONE_NUMBER_COUNT`] (`statistics.phone_number_count`)
//! - [`EMAIL_ADDRESS_COUNT`] (`statistics.email_address_count`)
//!
//! [`StatisticsSummary`] aggregates those counts over a processed record set.

use std::fmt;

use super::{PostProcessor, ProcessorError};
use crate::record::{
    PropertyKey, PropertyTypeError, PropertyValue, Record, TypedKey, EMAIL_ADDRESSES,
    PHONE_NUMBERS,
};

/// Number of phone number fields on a record.
pub const PHONE_NUMBER_COUNT: TypedKey<i64> =
    TypedKey::derived("statistics", "phone_number_count");

/// Number of email address fields on a record.
pub const EMAIL_ADDRESS_COUNT: TypedKey<i64> =
    TypedKey::derived("statistics", "email_address_count");

/// Counts phone number and email address fields per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticsPostProcessor;

impl StatisticsPostProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl PostProcessor for StatisticsPostProcessor {
    fn name(&self) -> &str {
        "statistics"
    }

    fn reads(&self) -> Vec<PropertyKey> {
        vec![PHONE_NUMBERS, EMAIL_ADDRESSES]
    }

    fn writes(&self) -> Vec<PropertyKey> {
        vec![
            PHONE_NUMBER_COUNT.key().clone(),
            EMAIL_ADDRESS_COUNT.key().clone(),
        ]
    }

    fn process(&self, records: &mut [Record]) -> Result<(), ProcessorError> {
        for record in records.iter_mut() {
            let phones = count_fields(record, &PHONE_NUMBERS)?;
            let emails = count_fields(record, &EMAIL_ADDRESSES)?;
            record.set_typed(&PHONE_NUMBER_COUNT, phones);
            record.set_typed(&EMAIL_ADDRESS_COUNT, emails);
        }
        Ok(())
    }
}

/// A list counts its entries; a lone text or labelled map counts as one.
fn count_fields(record: &Record, key: &PropertyKey) -> Result<i64, ProcessorError> {
    match record.get(key) {
        None => Ok(0),
        Some(PropertyValue::List(items)) => Ok(items.len() as i64),
        Some(PropertyValue::Text(_)) | Some(PropertyValue::Map(_)) => Ok(1),
        Some(other) => Err(ProcessorError::UnexpectedShape {
            record: record.id().to_string(),
            key: key.to_string(),
            expected: "list",
            found: other.kind(),
        }),
    }
}

/// Totals and averages over a processed record set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatisticsSummary {
    /// Number of records.
    pub count: usize,
    /// Sum of phone number fields.
    pub total_phone_numbers: i64,
    /// Sum of email address fields.
    pub total_email_addresses: i64,
}

impl StatisticsSummary {
    /// Sums the statistics counts of `records`.
    ///
    /// Records without counts (not processed) contribute zero; a count stored
    /// with the wrong type is an error.
    pub fn from_records(records: &[Record]) -> Result<Self, PropertyTypeError> {
        let mut summary = Self {
            count: records.len(),
            ..Self::default()
        };
        for record in records {
            summary.total_phone_numbers += record.get_typed(&PHONE_NUMBER_COUNT)?.unwrap_or(0);
            summary.total_email_addresses += record.get_typed(&EMAIL_ADDRESS_COUNT)?.unwrap_or(0);
        }
        Ok(summary)
    }

    /// Average phone number fields per record (0.0 for an empty set).
    pub fn average_phone_numbers(&self) -> f64 {
        average(self.total_phone_numbers, self.count)
    }

    /// Average email address fields per record (0.0 for an empty set).
    pub fn average_email_addresses(&self) -> f64 {
        average(self.total_email_addresses, self.count)
    }
}

fn average(total: i64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

impl fmt::Display for StatisticsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of contacts: {}", self.count)?;
        writeln!(
            f,
            "Average # of phone number fields: {:.2}",
            self.average_phone_numbers()
        )?;
        write!(
            f,
            "Average # of email address fields: {:.2}",
            self.average_email_addresses()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, phones: usize, emails: usize) -> Record {
        let mut builder = Record::contact(id);
        for n in 0..phones {
            builder = builder.phone_number(format!("555-01{:02}", n));
        }
        for n in 0..emails {
            builder = builder.email_address(format!("user{}@example.com", n));
        }
        builder.build()
    }

    #[test]
    fn test_counts_fields() {
        let mut records = vec![contact("1", 2, 1), contact("2", 0, 3)];
        StatisticsPostProcessor.process(&mut records).unwrap();

        assert_eq!(records[0].get_typed(&PHONE_NUMBER_COUNT), Ok(Some(2)));
        assert_eq!(records[0].get_typed(&EMAIL_ADDRESS_COUNT), Ok(Some(1)));
        assert_eq!(records[1].get_typed(&PHONE_NUMBER_COUNT), Ok(Some(0)));
        assert_eq!(records[1].get_typed(&EMAIL_ADDRESS_COUNT), Ok(Some(3)));
    }

    #[test]
    fn test_summary_totals_and_averages() {
        let mut records = vec![contact("1", 2, 1), contact("2", 0, 3)];
        StatisticsPostProcessor.process(&mut records).unwrap();

        let summary = StatisticsSummary::from_records(&records).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average_phone_numbers(), 1.0);
        assert_eq!(summary.average_email_addresses(), 2.0);
    }

    #[test]
    fn test_empty_summary_averages_zero() {
        let summary = StatisticsSummary::from_records(&[]).unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_phone_numbers(), 0.0);
    }

    #[test]
    fn test_labelled_entries_are_counted() {
        let json = r#"{"id": "1", "phone_numbers": [{"label": "home", "value": "555"}, "556"], "email_addresses": "a@b.c"}"#;
        let mut records = vec![serde_json::from_str::<Record>(json).unwrap()];
        StatisticsPostProcessor.process(&mut records).unwrap();

        assert_eq!(records[0].get_typed(&PHONE_NUMBER_COUNT), Ok(Some(2)));
        assert_eq!(records[0].get_typed(&EMAIL_ADDRESS_COUNT), Ok(Some(1)));
    }

    #[test]
    fn test_numeric_field_is_rejected() {
        let mut records = vec![Record::new("1").with(PHONE_NUMBERS, 5i64)];
        let err = StatisticsPostProcessor.process(&mut records).unwrap_err();
        assert!(matches!(err, ProcessorError::UnexpectedShape { found: "integer", .. }));
    }

    #[test]
    fn test_summary_rejects_mistyped_count() {
        let records = vec![Record::new("1").with(PHONE_NUMBER_COUNT.key().clone(), "two")];
        assert!(StatisticsSummary::from_records(&records).is_err());
    }

    #[test]
    fn test_display_report() {
        let summary = StatisticsSummary {
            count: 2,
            total_phone_numbers: 2,
            total_email_addresses: 4,
        };
        let report = summary.to_string();
        assert!(report.contains("Number of contacts: 2"));
        assert!(report.contains("phone number fields: 1.00"));
        assert!(report.contains("email address fields: 2.00"));
    }
}
