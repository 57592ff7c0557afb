use apple_device_specs::cli::{self, RunArgs};
use apple_device_specs::logging;
use apple_device_specs::types::DeviceFamily;
use clap::Parser;

#[derive(Parser)]
#[command(name = "mac-specs")]
#[command(about = "Build the Mac spec document")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    cli::run_family(DeviceFamily::Mac, &cli.run).await?;
    Ok(())
}
