// Row grouping by vertical proximity
use std::cmp::Ordering;

use crate::config::LayoutConfig;
use crate::types::{BoundingBox, Result, RowGroup, ScanError};

#[derive(Debug, Clone)]
pub struct RowGrouper {
    row_gap: f32,
    min_row_y: f32,
}

impl RowGrouper {
    pub fn new(row_gap: f32, min_row_y: f32) -> Self {
        Self { row_gap, min_row_y }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.row_gap, config.min_row_y)
    }

    /// Cluster boxes into top-to-bottom rows, each left to right.
    ///
    /// Boxes starting above `min_row_y` are dropped as decoration. A new row
    /// starts whenever the `y1` step to the previous box is at least `row_gap`.
    /// An empty input is a caller error.
    pub fn group(&self, boxes: &[BoundingBox]) -> Result<Vec<RowGroup>> {
        if boxes.is_empty() {
            return Err(ScanError::EmptyRegionSet("row grouping needs at least one box"));
        }

        let mut sorted: Vec<BoundingBox> = boxes
            .iter()
            .copied()
            .filter(|b| b.y1 >= self.min_row_y)
            .collect();
        sorted.sort_by(|a, b| {
            a.y1.partial_cmp(&b.y1)
                .unwrap_or(Ordering::Equal)
                .then(a.x1.partial_cmp(&b.x1).unwrap_or(Ordering::Equal))
        });

        let mut groups: Vec<RowGroup> = Vec::new();
        let mut previous_y: Option<f32> = None;

        for bbox in sorted {
            match (previous_y, groups.last_mut()) {
                (Some(prev), Some(current)) if bbox.y1 - prev < self.row_gap => current.push(bbox),
                _ => groups.push(RowGroup::new(bbox)),
            }
            previous_y = Some(bbox.y1);
        }

        tracing::trace!(input = boxes.len(), rows = groups.len(), "grouped boxes into rows");
        Ok(groups)
    }
}
