// Header/data association and clipped text extraction
use indexmap::IndexMap;
use serde::Serialize;

use super::document::PageSource;
use super::row_grouper::RowGrouper;
use crate::config::LayoutConfig;
use crate::types::{BoundingBox, Result, RowGroup, ScanError};

/// Header text -> cell values, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractedTable {
    columns: IndexMap<String, Vec<String>>,
}

impl ExtractedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.columns.entry(header.into()).or_default().push(value.into());
    }

    pub fn get(&self, header: &str) -> Option<&[String]> {
        self.columns.get(header).map(Vec::as_slice)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zip the columns into rows. Columns of different lengths are a layout anomaly.
    pub fn rows(&self) -> Result<Vec<ExtractedRow>> {
        let expected = match self.columns.values().next() {
            Some(values) => values.len(),
            None => return Ok(Vec::new()),
        };

        if let Some((column, values)) = self.columns.iter().find(|(_, v)| v.len() != expected) {
            return Err(ScanError::RaggedTable {
                column: column.clone(),
                expected,
                found: values.len(),
            });
        }

        Ok((0..expected)
            .map(|i| ExtractedRow {
                cells: self
                    .columns
                    .iter()
                    .map(|(header, values)| (header.clone(), values[i].clone()))
                    .collect(),
            })
            .collect())
    }
}

/// One row of an extracted table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractedRow {
    cells: IndexMap<String, String>,
}

impl ExtractedRow {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    /// Headers whose lower-cased text contains `hint`, in table order.
    pub fn columns_containing(&self, hint: &str) -> Vec<&str> {
        let hint = hint.to_lowercase();
        self.cells
            .keys()
            .filter(|h| h.to_lowercase().contains(&hint))
            .map(String::as_str)
            .collect()
    }

    /// Value of the `nth` column whose header contains `hint`.
    pub fn nth_containing(&self, hint: &str, nth: usize) -> Option<&str> {
        self.columns_containing(hint)
            .get(nth)
            .and_then(|header| self.get(header))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    /// One table per page per header/data row pairing.
    pub tables: Vec<ExtractedTable>,
    /// Text of each page's attestation zone.
    pub auxiliary_text: Vec<String>,
}

impl Extraction {
    pub fn auxiliary_text_joined(&self) -> String {
        self.auxiliary_text.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    grouper: RowGrouper,
    column_tolerance: f32,
    auxiliary_zone_start: f32,
}

impl FieldExtractor {
    pub fn new(grouper: RowGrouper, column_tolerance: f32, auxiliary_zone_start: f32) -> Self {
        Self {
            grouper,
            column_tolerance,
            auxiliary_zone_start,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(
            RowGrouper::from_config(config),
            config.column_tolerance,
            config.auxiliary_zone_start,
        )
    }

    pub fn extract(
        &self,
        document: &dyn PageSource,
        data_boxes: &[BoundingBox],
        header_boxes: &[BoundingBox],
    ) -> Result<Extraction> {
        let (data_groups, header_groups) = if data_boxes.is_empty() || header_boxes.is_empty() {
            tracing::debug!(
                data = data_boxes.len(),
                headers = header_boxes.len(),
                "no regions to pair, table will be empty"
            );
            (Vec::new(), Vec::new())
        } else {
            (self.grouper.group(data_boxes)?, self.grouper.group(header_boxes)?)
        };

        if data_groups.len() != header_groups.len() {
            return Err(ScanError::RowGroupMismatch {
                headers: header_groups.len(),
                data: data_groups.len(),
            });
        }

        let mut extraction = Extraction::default();

        for page in 0..document.page_count() {
            for (headers, data) in header_groups.iter().zip(&data_groups) {
                extraction
                    .tables
                    .push(self.build_table(document, page, headers, data)?);
            }

            let (width, height) = document.page_size(page)?;
            let zone = BoundingBox::new(0.0, height * self.auxiliary_zone_start, width, height);
            extraction.auxiliary_text.push(document.text_in(page, &zone)?);
        }

        Ok(extraction)
    }

    fn build_table(
        &self,
        document: &dyn PageSource,
        page: usize,
        headers: &RowGroup,
        data: &RowGroup,
    ) -> Result<ExtractedTable> {
        let mut table = ExtractedTable::new();

        for header in headers.boxes() {
            for cell in data.boxes() {
                if header.spans_horizontally(cell, self.column_tolerance) {
                    let h = document.text_in(page, header)?;
                    let d = document.text_in(page, cell)?;
                    table.push(h.trim(), d.trim());
                }
            }
        }

        Ok(table)
    }
}
