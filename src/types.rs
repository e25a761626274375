// Core types and errors for the BAA scanner
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in document space (points, top-left origin).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box, normalising so that `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// True when `other`'s horizontal span sits inside ours widened by `tolerance` on each side.
    pub fn spans_horizontally(&self, other: &BoundingBox, tolerance: f32) -> bool {
        self.x1 - tolerance <= other.x1 && self.x2 + tolerance >= other.x2
    }
}

/// Boxes judged to sit on the same table row, left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowGroup {
    boxes: Vec<BoundingBox>,
}

impl RowGroup {
    pub fn new(first: BoundingBox) -> Self {
        Self { boxes: vec![first] }
    }

    pub fn push(&mut self, bbox: BoundingBox) {
        self.boxes.push(bbox);
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn first(&self) -> Option<&BoundingBox> {
        self.boxes.first()
    }

    pub fn last(&self) -> Option<&BoundingBox> {
        self.boxes.last()
    }
}

/// RGB colour in the rasterised page's channel order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Inclusive per-channel window `[c - tolerance, c + tolerance]`, clamped to 0..=255.
    pub fn window(&self, tolerance: u8) -> ([u8; 3], [u8; 3]) {
        let mut lower = [0u8; 3];
        let mut upper = [0u8; 3];
        for (i, c) in self.0.iter().enumerate() {
            lower[i] = c.saturating_sub(tolerance);
            upper[i] = c.saturating_add(tolerance);
        }
        (lower, upper)
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("no regions to group: {0}")]
    EmptyRegionSet(&'static str),

    #[error("layout anomaly: {headers} header rows but {data} data rows")]
    RowGroupMismatch { headers: usize, data: usize },

    #[error("layout anomaly: column '{column}' has {found} values, expected {expected}")]
    RaggedTable {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("text layer error: {0}")]
    TextLayer(String),

    #[error("reference store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("reference store has no column '{0}'")]
    MissingColumn(String),

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("record {record} has {cells} cells for {columns} columns")]
    RecordShape {
        record: i64,
        cells: usize,
        columns: usize,
    },

    #[error("reference store lock poisoned")]
    StorePoisoned,

    #[error("worker error: {0}")]
    Worker(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("scan cancelled")]
    Cancelled,
}

impl From<lopdf::Error> for ScanError {
    fn from(err: lopdf::Error) -> Self {
        ScanError::Pdf(err.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalises_corners() {
        let b = BoundingBox::new(10.0, 20.0, 2.0, 5.0);
        assert_eq!(b, BoundingBox { x1: 2.0, y1: 5.0, x2: 10.0, y2: 20.0 });
    }

    #[test]
    fn test_horizontal_span_tolerance() {
        let header = BoundingBox::new(10.0, 0.0, 100.0, 10.0);
        assert!(header.spans_horizontally(&BoundingBox::new(12.0, 20.0, 98.0, 30.0), 5.0));
        assert!(header.spans_horizontally(&BoundingBox::new(5.0, 20.0, 105.0, 30.0), 5.0));
        assert!(!header.spans_horizontally(&BoundingBox::new(4.0, 20.0, 50.0, 30.0), 5.0));
        assert!(!header.spans_horizontally(&BoundingBox::new(0.0, 20.0, 50.0, 30.0), 5.0));
    }

    #[test]
    fn test_colour_window_saturates() {
        let (lower, upper) = Rgb::new(254, 0, 128).window(20);
        assert_eq!(lower, [234, 0, 108]);
        assert_eq!(upper, [255, 20, 148]);
    }
}
