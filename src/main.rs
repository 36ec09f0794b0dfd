use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use combat_scan_lib::commands::DetectionService;
use combat_scan_lib::models::DetectorConfig;
use combat_scan_lib::services::ConfigManager;
use std::path::PathBuf;

/// Screenshot analyzer: UI region presence and combat power readout
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze screenshots and print each record as JSON
    Analyze {
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,
    },
    /// Print stored detection records
    History,
    /// Write the default config if none exists
    InitConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    if let Command::InitConfig = args.command {
        if !manager.config_exists() {
            manager.save(&DetectorConfig::default())?;
        }
        println!("{}", manager.config_file_path().display());
        return Ok(());
    }

    let config = manager
        .load()
        .with_context(|| format!("Failed to load {}", manager.config_file_path().display()))?;
    combat_scan_lib::init_logging(&config.logging);

    // The HTTP OCR client is blocking: build and drop it outside the runtime
    let service = combat_scan_lib::build_service(&config).context("Failed to start detection service")?;

    match args.command {
        Command::Analyze { images } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let result = runtime.block_on(analyze_all(&service, images));
            drop(runtime);
            result
        }
        Command::History => {
            for record in service.history()? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Command::InitConfig => Ok(()),
    }
}

async fn analyze_all(service: &DetectionService, images: Vec<PathBuf>) -> Result<()> {
    let handles: Vec<_> = images
        .into_iter()
        .map(|path| {
            let service = service.clone();
            tokio::spawn(async move {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                service
                    .submit(bytes, path.display().to_string())
                    .await
                    .with_context(|| format!("Failed to analyze {}", path.display()))
            })
        })
        .collect();

    let mut failures = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(record) => println!("{}", serde_json::to_string(&record)?),
            Err(e) => {
                tracing::error!("{:#}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} image(s) could not be analyzed", failures);
    }
    Ok(())
}
