// Page processing - rasterise, detect, group and extract one document
use serde::Serialize;
use std::time::Instant;

use super::document::PageSource;
use super::field_extractor::{ExtractedTable, FieldExtractor};
use super::region_detector::RegionDetector;
use crate::config::{DetectionConfig, ScanConfig};
use crate::types::{BoundingBox, Result};

// Only the first page is rasterised for colour detection
const DETECTION_PAGE: usize = 0;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectedRegions {
    pub headers: Vec<BoundingBox>,
    pub data: Vec<BoundingBox>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessedDocument {
    /// The authoritative table: first page, first row pairing. Empty when none was found.
    pub table: ExtractedTable,
    pub tables: Vec<ExtractedTable>,
    pub auxiliary_text: String,
    pub regions: DetectedRegions,
    pub processing_time_ms: u64,
}

pub struct PageProcessor {
    detection: DetectionConfig,
    detector: RegionDetector,
    extractor: FieldExtractor,
}

impl PageProcessor {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            detection: config.detection.clone(),
            detector: RegionDetector::from_config(&config.detection),
            extractor: FieldExtractor::from_config(&config.layout),
        }
    }

    pub fn detect(&self, document: &dyn PageSource) -> Result<DetectedRegions> {
        let page = document.rasterize(DETECTION_PAGE, self.detection.dpi)?;

        Ok(DetectedRegions {
            headers: self.detector.detect(&page, self.detection.header_color),
            data: self.detector.detect(&page, self.detection.data_color),
        })
    }

    pub fn process(&self, document: &dyn PageSource) -> Result<ProcessedDocument> {
        let start = Instant::now();

        let regions = self.detect(document)?;
        let extraction = self
            .extractor
            .extract(document, &regions.data, &regions.headers)?;

        let auxiliary_text = extraction.auxiliary_text_joined();
        let table = extraction.tables.first().cloned().unwrap_or_default();

        tracing::info!(
            headers = regions.headers.len(),
            data = regions.data.len(),
            tables = extraction.tables.len(),
            columns = table.headers().count(),
            "document processed"
        );

        Ok(ProcessedDocument {
            table,
            tables: extraction.tables,
            auxiliary_text,
            regions,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
