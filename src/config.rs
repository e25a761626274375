// Configuration for the BAA scanner
//
// Every layout constant of the source template lives here so another template
// or rasterisation resolution only needs a different TOML file.
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Rgb, Result, ScanError};

pub const CONFIG_ENV: &str = "BAA_SCANNER_CONFIG";
pub const POPPLER_ENV: &str = "BAA_POPPLER_PATH";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub detection: DetectionConfig,
    pub layout: LayoutConfig,
    pub fields: FieldConfig,
    pub reference: ReferenceConfig,
    pub poppler: PopplerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rasterisation resolution used for colour detection.
    pub dpi: u32,
    /// Native resolution of document coordinates (PDF points).
    pub native_dpi: f32,
    pub color_tolerance: u8,
    pub header_color: Rgb,
    pub data_color: Rgb,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            dpi: 600,
            native_dpi: 72.0,
            color_tolerance: 20,
            header_color: Rgb::new(254, 0, 0),
            data_color: Rgb::new(255, 192, 0),
        }
    }
}

impl DetectionConfig {
    /// Pixel-to-point factor, 0.12 at 600 dpi.
    pub fn scale(&self) -> f32 {
        self.native_dpi / self.dpi as f32
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical distance between consecutive boxes that starts a new row.
    pub row_gap: f32,
    /// Boxes starting above this line are decoration, not table.
    pub min_row_y: f32,
    /// Slack on each side when matching a data cell under a header.
    pub column_tolerance: f32,
    /// Fraction of page height where the free-text attestation zone begins.
    pub auxiliary_zone_start: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_gap: 50.0,
            min_row_y: 50.0,
            column_tolerance: 5.0,
            auxiliary_zone_start: 0.65,
        }
    }
}

/// Header names and hints for the table extracted from the document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldConfig {
    pub system_key: String,
    pub origin_site_id: String,
    pub span_id: String,
    pub length_hint: String,
    pub site_hint: String,
    pub activation_hint: String,
    pub signing_hint: String,
    pub date_format: String,
    pub span_delimiter: String,
    /// Name that must appear in the attestation zone. Empty means never present.
    pub expected_signer: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            system_key: "Systemkey".to_string(),
            origin_site_id: "Origin Site ID".to_string(),
            span_id: "Span ID".to_string(),
            length_hint: "connection".to_string(),
            site_hint: "site".to_string(),
            activation_hint: "activation".to_string(),
            signing_hint: "signing".to_string(),
            date_format: "%d-%b-%y".to_string(),
            span_delimiter: "-".to_string(),
            expected_signer: String::new(),
        }
    }
}

/// Reference store table and the column names used as verdict keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub table: String,
    pub system_key: String,
    pub site_id: String,
    pub site_name: String,
    pub far_end_id: String,
    pub ring_id: String,
    pub span_id: String,
    pub date: String,
    pub length: String,
    pub signing_date: String,
    pub signing_person: String,
    /// Sole verdict key when no reference record matches.
    pub no_match_key: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            table: "records".to_string(),
            system_key: "SYSTEM_KEY".to_string(),
            site_id: "SITE_ID".to_string(),
            site_name: "SITE_NAME".to_string(),
            far_end_id: "FAR_END_ID".to_string(),
            ring_id: "ring_id".to_string(),
            span_id: "SPAN_ID".to_string(),
            date: "BAA_TLP".to_string(),
            length: "FLP_Length".to_string(),
            signing_date: "Signing_Date".to_string(),
            signing_person: "Signing_Person".to_string(),
            no_match_key: "match_found".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PopplerConfig {
    /// Directory holding `pdftoppm` and `pdftotext`; PATH lookup when unset.
    pub bin_dir: Option<PathBuf>,
}

impl PopplerConfig {
    pub fn tool(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl ScanConfig {
    /// Load from an explicit path, `$BAA_SCANNER_CONFIG`, or the user config dir, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let mut config = match candidate {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Self::from_toml(&fs::read_to_string(&p)?)?
            }
            None => Self::default(),
        };

        if let Ok(dir) = env::var(POPPLER_ENV) {
            config.poppler.bin_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.dpi == 0 {
            return Err(ScanError::Config("detection.dpi must be positive".into()));
        }
        if self.detection.native_dpi <= 0.0 {
            return Err(ScanError::Config("detection.native_dpi must be positive".into()));
        }
        if self.layout.row_gap <= 0.0 {
            return Err(ScanError::Config("layout.row_gap must be positive".into()));
        }
        if self.layout.column_tolerance < 0.0 {
            return Err(ScanError::Config("layout.column_tolerance must not be negative".into()));
        }
        let zone = self.layout.auxiliary_zone_start;
        if !(zone > 0.0 && zone < 1.0) {
            return Err(ScanError::Config(format!(
                "layout.auxiliary_zone_start must be within (0, 1), got {}",
                zone
            )));
        }
        if self.fields.span_delimiter.is_empty() {
            return Err(ScanError::Config("fields.span_delimiter must not be empty".into()));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("baa-scanner").join("config.toml"))
}
