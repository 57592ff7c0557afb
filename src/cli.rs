//! Shared entry point for the per-family binaries and the umbrella command.

use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineResult};
use crate::types::DeviceFamily;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a TOML config file (defaults to ./device_specs.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the document here instead of the configured path
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Load configuration and run one family's pipeline.
pub async fn run_family(family: DeviceFamily, args: &RunArgs) -> anyhow::Result<PipelineResult> {
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let mut pipeline_config = config
        .pipeline(family)
        .with_context(|| format!("Invalid configuration for {}", family))?;
    if let Some(output) = &args.output {
        pipeline_config.output_path = output.clone();
    }

    info!("Running {} pipeline", family);
    let pipeline = Pipeline::from_config(pipeline_config)
        .with_context(|| format!("Failed to set up {} sources", family))?;
    let result = pipeline
        .run()
        .await
        .with_context(|| format!("{} pipeline failed", family))?;

    print_summary(&result);
    Ok(result)
}

pub fn print_summary(result: &PipelineResult) {
    println!("\n📊 Pipeline Results for {}:", result.family);
    for source in &result.sources {
        println!(
            "   {}: {} records ({} skipped rows)",
            source.source, source.records, source.skipped_rows
        );
    }
    println!("   Merged devices: {}", result.merged_devices);
    println!("   Below chip cutoff: {}", result.below_cutoff.len());
    if !result.defaulted_ram.is_empty() {
        println!("   RAM assumed from chip tier: {}", result.defaulted_ram.len());
    }
    println!("   Written: {}", result.written_devices);
    if let Some(version) = &result.xcode_version {
        println!("   Xcode version: {}", version);
    }
    println!("   Output file: {}", result.output_file.display());

    if !result.incomplete.is_empty() {
        println!("\n⚠️  Incomplete devices (missing sku, chip or RAM):");
        for name in &result.incomplete {
            println!("   - {}", name);
        }
    }
}
