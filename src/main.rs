use apple_device_specs::cli::{self, RunArgs};
use apple_device_specs::logging;
use apple_device_specs::types::DeviceFamily;
use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(name = "apple-device-specs")]
#[command(about = "Collect and merge Apple device specifications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build apple/iPhone.json
    Iphone(RunArgs),
    /// Build apple/iPad.json
    Ipad(RunArgs),
    /// Build apple/Mac.json
    Mac(RunArgs),
    /// Build every family, stopping at the first failure
    All {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();

    let runs: Vec<(DeviceFamily, RunArgs)> = match cli.command {
        Commands::Iphone(args) => vec![(DeviceFamily::IPhone, args)],
        Commands::Ipad(args) => vec![(DeviceFamily::IPad, args)],
        Commands::Mac(args) => vec![(DeviceFamily::Mac, args)],
        Commands::All { config } => DeviceFamily::ALL
            .iter()
            .map(|family| {
                let args = RunArgs {
                    config: config.clone(),
                    output: None,
                };
                (*family, args)
            })
            .collect(),
    };

    for (family, args) in runs {
        if let Err(e) = cli::run_family(family, &args).await {
            error!("{} pipeline failed: {:#}", family, e);
            return Err(e);
        }
    }

    println!("\n✅ Done");
    Ok(())
}
