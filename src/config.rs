use crate::chip::ChipGeneration;
use crate::constants::{
    APPLE_WIKI_API_URL, APPLICATIONS_DIR, DEFAULT_CONFIG_FILE, DEFAULT_MATCH_CUTOFF, XCODE_DB_ENV,
};
use crate::error::{Result, SpecsError};
use crate::types::{DeviceFamily, SourceKind};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of `device_specs.toml`: one optional table per family
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub iphone: FamilyConfig,
    pub ipad: FamilyConfig,
    pub mac: FamilyConfig,
}

/// Per-family overrides; anything unset falls back to the family default
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamilyConfig {
    pub min_chip_generation: Option<ChipGeneration>,
    pub output_path: Option<PathBuf>,
    pub precedence: Option<Vec<SourceKind>>,
    pub match_cutoff: Option<f64>,
    pub apple_wiki_api: Option<String>,
    pub apple_wiki_page: Option<String>,
    pub wikipedia_url: Option<String>,
    pub xcode_db_paths: Option<Vec<PathBuf>>,
    pub applications_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEndpoints {
    pub apple_wiki_api: String,
    pub apple_wiki_page: String,
    pub wikipedia_url: Option<String>,
    /// Explicit databases; empty means scan `applications_dir`
    pub xcode_db_paths: Vec<PathBuf>,
    pub applications_dir: PathBuf,
}

/// Everything one pipeline run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub family: DeviceFamily,
    pub min_chip_generation: ChipGeneration,
    pub source_endpoints: SourceEndpoints,
    pub output_path: PathBuf,
    /// Ascending: later sources overwrite earlier ones per field
    pub precedence: Vec<SourceKind>,
    pub match_cutoff: f64,
}

impl Config {
    /// Load `path`, or `device_specs.toml` when present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            SpecsError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn family(&self, family: DeviceFamily) -> &FamilyConfig {
        match family {
            DeviceFamily::IPhone => &self.iphone,
            DeviceFamily::IPad => &self.ipad,
            DeviceFamily::Mac => &self.mac,
        }
    }

    /// Resolve the effective configuration for one family.
    ///
    /// `DEVICE_SPECS_XCODE_DB` replaces any configured database paths.
    pub fn pipeline(&self, family: DeviceFamily) -> Result<PipelineConfig> {
        let env_db = std::env::var(XCODE_DB_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        self.family(family).resolve(family, env_db)
    }
}

impl FamilyConfig {
    fn resolve(&self, family: DeviceFamily, env_db: Option<PathBuf>) -> Result<PipelineConfig> {
        let mut resolved = PipelineConfig::defaults(family);

        if let Some(min) = self.min_chip_generation {
            resolved.min_chip_generation = min;
        }
        if let Some(path) = &self.output_path {
            resolved.output_path = path.clone();
        }
        if let Some(precedence) = &self.precedence {
            resolved.precedence = precedence.clone();
        }
        if let Some(cutoff) = self.match_cutoff {
            resolved.match_cutoff = cutoff;
        }

        let endpoints = &mut resolved.source_endpoints;
        if let Some(api) = &self.apple_wiki_api {
            endpoints.apple_wiki_api = api.clone();
        }
        if let Some(page) = &self.apple_wiki_page {
            endpoints.apple_wiki_page = page.clone();
        }
        if let Some(url) = &self.wikipedia_url {
            endpoints.wikipedia_url = Some(url.clone());
        }
        if let Some(paths) = &self.xcode_db_paths {
            endpoints.xcode_db_paths = paths.clone();
        }
        if let Some(dir) = &self.applications_dir {
            endpoints.applications_dir = dir.clone();
        }
        if let Some(db) = env_db {
            endpoints.xcode_db_paths = vec![db];
        }

        resolved.validate()?;
        Ok(resolved)
    }
}

impl PipelineConfig {
    pub fn defaults(family: DeviceFamily) -> Self {
        Self {
            family,
            min_chip_generation: family.default_min_chip_generation(),
            source_endpoints: SourceEndpoints {
                apple_wiki_api: APPLE_WIKI_API_URL.to_string(),
                apple_wiki_page: family.apple_wiki_page().to_string(),
                wikipedia_url: family.wikipedia_url().map(str::to_string),
                xcode_db_paths: Vec::new(),
                applications_dir: PathBuf::from(APPLICATIONS_DIR),
            },
            output_path: family.default_output_path(),
            precedence: family.default_precedence(),
            match_cutoff: DEFAULT_MATCH_CUTOFF,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.precedence.is_empty() {
            return Err(SpecsError::Config(format!(
                "{}: precedence must name at least one source",
                self.family
            )));
        }
        let mut seen = HashSet::new();
        for kind in &self.precedence {
            if !seen.insert(kind) {
                return Err(SpecsError::Config(format!(
                    "{}: source {} appears twice in precedence",
                    self.family, kind
                )));
            }
        }
        if !(self.match_cutoff > 0.0 && self.match_cutoff <= 1.0) {
            return Err(SpecsError::Config(format!(
                "{}: match_cutoff must be in (0, 1], got {}",
                self.family, self.match_cutoff
            )));
        }
        if self.precedence.contains(&SourceKind::Wikipedia)
            && self.source_endpoints.wikipedia_url.is_none()
        {
            return Err(SpecsError::Config(format!(
                "{}: wikipedia is listed in precedence but wikipedia_url is not set",
                self.family
            )));
        }
        Ok(())
    }
}
