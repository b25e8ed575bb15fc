use std::io;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use gpu_nfdhook::Cli;
use gpu_nfdhook::Labeler;
use gpu_nfdhook::LabelerConfig;
use gpu_nfdhook::OutputFormat;
use gpu_nfdhook::SysfsDeviceHealth;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    logging::init();

    tracing::debug!("Starting gpu-nfdhook {}", &**version::VERSION);

    let config = LabelerConfig::from(&cli);
    let labels = Labeler::new(config, SysfsDeviceHealth)
        .create_labels()
        .map_err(|e| anyhow::anyhow!("Failed to create GPU labels: {e:?}"))?;

    let stdout = io::stdout().lock();
    match cli.output_format {
        OutputFormat::Lines => labels
            .write_lines(stdout)
            .context("Failed to print labels")?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(stdout, &labels).context("Failed to print labels")?;
            println!();
        }
    }

    Ok(())
}
