// baa-scanner library: colour-coded BAA form extraction and reference cross-checking
pub mod config;
pub mod logging;
pub mod pdf_extraction;
pub mod scanner;
pub mod storage;
pub mod types;
pub mod validation;

pub use config::ScanConfig;
pub use scanner::{CancelFlag, DocumentOutcome, DocumentReport, OutcomeStatus, Scanner};
pub use types::{BoundingBox, Result, RowGroup, ScanError};
