use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::Result;
use crate::merge::Reconciler;
use crate::sources::overrides::ram_fallback;
use crate::sources::sources_for;
use crate::types::{DeviceFamily, DeviceSource, SourceKind};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// What one source contributed during a run
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source: SourceKind,
    pub records: usize,
    pub skipped_rows: usize,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub family: DeviceFamily,
    pub sources: Vec<SourceSummary>,
    /// Distinct devices after merging, before filtering
    pub merged_devices: usize,
    pub incomplete: Vec<String>,
    pub below_cutoff: Vec<String>,
    /// Devices whose RAM is the chip-tier default rather than a reported value
    pub defaulted_ram: Vec<String>,
    pub written_devices: usize,
    pub xcode_version: Option<String>,
    pub output_file: PathBuf,
}

/// Fetch, merge, filter and write one device family
pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Box<dyn DeviceSource>>,
}

impl Pipeline {
    /// Build the pipeline with the sources the config's precedence list names.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let sources = sources_for(&config)?;
        Ok(Self { config, sources })
    }

    /// Build the pipeline with caller-supplied sources.
    pub fn with_sources(config: PipelineConfig, sources: Vec<Box<dyn DeviceSource>>) -> Self {
        Self { config, sources }
    }

    /// Run every source, merge their records and write the family's document.
    ///
    /// Any source failure aborts the run before the output file is touched.
    #[instrument(skip(self), fields(family = %self.config.family))]
    pub async fn run(&self) -> Result<PipelineResult> {
        let family = self.config.family;
        info!("🚀 Starting {} pipeline", family);

        // Step 1: Collect from every source
        let mut summaries = Vec::with_capacity(self.sources.len());
        let mut records = Vec::new();
        let mut xcode_version = None;
        for source in &self.sources {
            info!("📡 Collecting from {}...", source.kind());
            let output = source.collect().await?;
            info!(
                "✅ {} produced {} records ({} rows skipped)",
                output.source,
                output.records.len(),
                output.skipped_rows
            );
            if xcode_version.is_none() && output.source == SourceKind::Xcode {
                xcode_version = output.provenance.clone();
            }
            summaries.push(SourceSummary {
                source: output.source,
                records: output.records.len(),
                skipped_rows: output.skipped_rows,
            });
            records.extend(output.records);
        }

        // Step 2: Merge in precedence order
        info!("🔧 Merging {} partial records...", records.len());
        let mut reconciler = Reconciler::new(
            self.config.precedence.clone(),
            family.sku_shape(),
            self.config.match_cutoff,
        );
        if let Some(fallback) = ram_fallback(family) {
            reconciler = reconciler.with_ram_fallback(fallback);
        }
        reconciler.merge(records);
        let merged_devices = reconciler.devices().len();

        // Step 3: Drop incomplete and outdated devices
        let outcome = reconciler.finish(&self.config.min_chip_generation);
        if !outcome.defaulted_ram.is_empty() {
            warn!(
                "Assumed base RAM from chip tier for {} devices: {}",
                outcome.defaulted_ram.len(),
                outcome.defaulted_ram.join(", ")
            );
        }
        if !outcome.incomplete.is_empty() {
            warn!(
                "Dropped {} incomplete devices: {}",
                outcome.incomplete.len(),
                outcome.incomplete.join(", ")
            );
        }
        info!(
            "✅ {} devices meet the {} cutoff ({} older)",
            outcome.devices.len(),
            self.config.min_chip_generation,
            outcome.below_cutoff.len()
        );

        // Step 4: Persist
        let written_devices = outcome.devices.len();
        let document = Document::new(outcome.devices, xcode_version.clone());
        document.write_to(&self.config.output_path)?;
        info!("💾 Saved {} devices to {}", written_devices, self.config.output_path.display());

        Ok(PipelineResult {
            family,
            sources: summaries,
            merged_devices,
            incomplete: outcome.incomplete,
            below_cutoff: outcome.below_cutoff,
            defaulted_ram: outcome.defaulted_ram,
            written_devices,
            xcode_version,
            output_file: self.config.output_path.clone(),
        })
    }
}
