use crate::error::{Result, SpecsError};
use crate::types::DeviceRecord;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One family's output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Local time of generation
    pub date_generated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xcode_version: Option<String>,
    /// Keyed by display name; ordered so output is stable across runs
    pub total_menu: BTreeMap<String, DeviceRecord>,
}

impl Document {
    pub fn new(total_menu: BTreeMap<String, DeviceRecord>, xcode_version: Option<String>) -> Self {
        Self {
            date_generated: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            xcode_version,
            total_menu,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the document to `path`, replacing any previous file.
    ///
    /// Content goes to a sibling temp file first and is renamed into place, so a
    /// failed run never leaves a truncated document behind.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        let json = self.to_json_pretty()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SpecsError::write(&display, e))?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| SpecsError::write(&display, "output path has no file name"))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| SpecsError::write(&display, e))?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(SpecsError::write(&display, e));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
