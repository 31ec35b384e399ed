pub mod core;
pub mod edgar;

// Re-exports
pub use crate::core::config::ParseConfig;
pub use edgar::filing::{parse_many, parse_sections, read_filing_text, Filing, FilingInput};
pub use edgar::parsing::section::{Section, SectionMap};
pub use edgar::report::ReportType;
