pub mod filing;
pub mod parsing;
pub mod report;
pub mod structure;

pub use filing::{parse_many, parse_sections, read_filing_text, Filing, FilingInput, SearchHit};
pub use report::ReportType;
pub use structure::{FilingStructure, Strategy, StructureReport};
