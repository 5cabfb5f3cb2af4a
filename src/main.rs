// src/main.rs

use anyhow::Result;
use apkpatch::cli::Cli;
use apkpatch::tools::format_duration;
use apkpatch::{Pipeline, PipelineConfig, Settings, Toolbox};
use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_filter = if cli.verbose { "apkpatch=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    info!("-----apkpatch startup-----");
    let start = Instant::now();

    let code = match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = e.exit_code();
            if status == 0 {
                warn!("{}, exiting", e);
            } else {
                error!("{}", e);
            }
            ExitCode::from(status)
        }
    };

    info!("Total time: {}", format_duration(start.elapsed()));
    Ok(code)
}

fn run(cli: &Cli) -> apkpatch::Result<()> {
    let mut settings = Settings::default();
    let config = PipelineConfig::load(&cli.config, cli.to_flags(), &mut settings)?;

    let tools = Toolbox::new(&config, &settings, apkpatch::platform::detect())?;
    let confirm = cli.confirm();

    let mut pipeline = Pipeline::new(&config, &settings, &tools, confirm.as_ref());
    let summary = pipeline.run()?;
    for report in &summary.stages {
        info!("  {:<20} {}", report.stage.name(), format_duration(report.elapsed));
    }
    Ok(())
}
