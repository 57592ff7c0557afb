use crate::chip::{ChipGeneration, ChipSeries};
use crate::constants::{
    APPLE_WIKI_IPAD_PAGE, APPLE_WIKI_IPHONE_PAGE, APPLE_WIKI_MAC_PAGE, OUTPUT_DIR,
    WIKIPEDIA_IPHONE_URL,
};
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Device families that get their own pipeline and output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    IPhone,
    IPad,
    Mac,
}

/// Whether a family's records carry one SKU or every variant's SKU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkuShape {
    Single,
    List,
}

impl DeviceFamily {
    pub const ALL: [DeviceFamily; 3] =
        [DeviceFamily::IPhone, DeviceFamily::IPad, DeviceFamily::Mac];

    /// Marketing name, also the `ProductType` prefix in Xcode and the output file stem
    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceFamily::IPhone => "iPhone",
            DeviceFamily::IPad => "iPad",
            DeviceFamily::Mac => "Mac",
        }
    }

    pub fn sku_shape(&self) -> SkuShape {
        match self {
            DeviceFamily::IPhone => SkuShape::Single,
            DeviceFamily::IPad | DeviceFamily::Mac => SkuShape::List,
        }
    }

    pub fn apple_wiki_page(&self) -> &'static str {
        match self {
            DeviceFamily::IPhone => APPLE_WIKI_IPHONE_PAGE,
            DeviceFamily::IPad => APPLE_WIKI_IPAD_PAGE,
            DeviceFamily::Mac => APPLE_WIKI_MAC_PAGE,
        }
    }

    pub fn wikipedia_url(&self) -> Option<&'static str> {
        match self {
            DeviceFamily::IPhone => Some(WIKIPEDIA_IPHONE_URL),
            DeviceFamily::IPad | DeviceFamily::Mac => None,
        }
    }

    pub fn default_output_path(&self) -> PathBuf {
        PathBuf::from(OUTPUT_DIR).join(format!("{}.json", self.display_name()))
    }

    pub fn default_min_chip_generation(&self) -> ChipGeneration {
        match self {
            DeviceFamily::IPhone => ChipGeneration::new(ChipSeries::A, 13),
            DeviceFamily::IPad => ChipGeneration::new(ChipSeries::A, 12),
            DeviceFamily::Mac => ChipGeneration::new(ChipSeries::M, 1),
        }
    }

    /// Ascending precedence: a later source overwrites an earlier one field by field.
    pub fn default_precedence(&self) -> Vec<SourceKind> {
        match self {
            DeviceFamily::IPhone => vec![
                SourceKind::Xcode,
                SourceKind::AppleWiki,
                SourceKind::Wikipedia,
            ],
            DeviceFamily::IPad | DeviceFamily::Mac => vec![
                SourceKind::Xcode,
                SourceKind::AppleWiki,
                SourceKind::Overrides,
            ],
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Xcode,
    AppleWiki,
    Wikipedia,
    Overrides,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Xcode => "xcode",
            SourceKind::AppleWiki => "apple_wiki",
            SourceKind::Wikipedia => "wikipedia",
            SourceKind::Overrides => "overrides",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's contribution for one device, before merge
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    pub name: String,
    pub source: SourceKind,
    pub sku: Vec<String>,
    pub chip: Option<String>,
    pub ram: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl PartialRecord {
    pub fn new(name: impl Into<String>, source: SourceKind) -> Self {
        Self {
            name: name.into(),
            source,
            sku: Vec::new(),
            chip: None,
            ram: None,
            release_date: None,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku.push(sku.into());
        self
    }

    pub fn with_chip(mut self, chip: impl Into<String>) -> Self {
        self.chip = Some(chip.into());
        self
    }

    pub fn with_ram(mut self, ram: impl Into<String>) -> Self {
        self.ram = Some(ram.into());
        self
    }

    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sku.is_empty()
            && self.chip.is_none()
            && self.ram.is_none()
            && self.release_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sku {
    Single(String),
    List(Vec<String>),
}

/// Normalized entry written to `total_menu`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub sku: Sku,
    pub chip: String,
    pub ram: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
}

/// Everything one source produced during a run
#[derive(Debug, Clone)]
pub struct SourceOutput {
    pub source: SourceKind,
    pub records: Vec<PartialRecord>,
    /// Rows the parser could not turn into a record
    pub skipped_rows: usize,
    /// Tool version the data came from, if the source knows it
    pub provenance: Option<String>,
}

impl SourceOutput {
    pub fn new(source: SourceKind, records: Vec<PartialRecord>, skipped_rows: usize) -> Self {
        Self {
            source,
            records,
            skipped_rows,
            provenance: None,
        }
    }
}

/// Core trait that all device data sources implement
#[async_trait::async_trait]
pub trait DeviceSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch the raw data and parse it into partial records
    async fn collect(&self) -> Result<SourceOutput>;
}
