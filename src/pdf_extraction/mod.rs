// PDF extraction module - colour-region detection and clipped text extraction
pub mod document;
pub mod field_extractor;
pub mod lopdf_helper;
pub mod page_processor;
pub mod region_detector;
pub mod renderer;
pub mod row_grouper;
pub mod text_layer;

pub use document::{DocumentLoader, PageSource, PopplerDocument, PopplerLoader};
pub use field_extractor::{ExtractedRow, ExtractedTable, Extraction, FieldExtractor};
pub use page_processor::{DetectedRegions, PageProcessor, ProcessedDocument};
pub use region_detector::RegionDetector;
pub use renderer::SystemPdfRenderer;
pub use row_grouper::RowGrouper;
pub use text_layer::TextLayer;
