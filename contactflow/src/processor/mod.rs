//! Post-processors that annotate merged records.
//!
//! # Processors
//!
//! - [`StatisticsPostProcessor`] - counts phone number and email fields
//! - [`DisplayNamePostProcessor`] - derives a display name
//!
//! # Data Flow
//!
//! ```text
//! statistics   → statistics.phone_number_count: i64
//!              → statistics.email_address_count: i64
//! display-name → display.name: String
//! ```
//!
//! Processors run through a [`ProcessorChain`], strictly in registration
//! order, so a later processor may read keys an earlier one wrote.

mod chain;
mod display_name;
mod statistics;
mod types;

pub use chain::{ChainError, DependencyIssue, DependencyProblem, ProcessorChain};
pub use display_name::DisplayNamePostProcessor;
pub use statistics::{
    StatisticsPostProcessor, StatisticsSummary, EMAIL_ADDRESS_COUNT, PHONE_NUMBER_COUNT,
};
pub use types::{PostProcessor, ProcessorError};
