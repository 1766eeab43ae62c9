use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use consult_scribe::{
    AudioAsset, Config, HttpSummaryService, Orchestrator, ProcessingReport, ProgressUpdate,
};
use tracing::{info, warn};

/// Upload a consultation recording and wait for its analysis result.
#[derive(Debug, Parser)]
#[command(name = "consult-scribe", version)]
struct Args {
    /// Audio file to process (wav, webm, ogg, m4a, mp3, flac)
    input: PathBuf,

    /// Config file base name (without extension)
    #[arg(short, long, default_value = "config/consult-scribe")]
    config: String,

    /// Override the remote service base URL
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("No config loaded from '{}' ({}), using defaults", args.config, e);
            Config::default()
        }
    };
    if let Some(server) = args.server {
        cfg.remote.base_url = server;
    }

    info!("{} starting", cfg.service.name);
    info!("Remote service: {}", cfg.remote.base_url);

    let asset = AudioAsset::from_file(&args.input)?;

    let service = Arc::new(HttpSummaryService::new(
        cfg.remote.base_url.clone(),
        cfg.remote.timeout(),
    )?);
    let orchestrator = Arc::new(Orchestrator::with_options(
        service,
        cfg.polling.retry_policy(),
        cfg.polling.grace_delay(),
    ));

    // Ctrl-C cancels at the next suspension point.
    let canceller = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let on_progress = |update: ProgressUpdate| match (update.attempt, update.max_attempts) {
        (Some(attempt), Some(max)) => {
            info!("[{}] {} ({}/{})", update.stage, update.message, attempt, max)
        }
        _ => info!("[{}] {}", update.stage, update.message),
    };

    let report: ProcessingReport = orchestrator.process(asset, &on_progress).await.into();

    if report.ok {
        let payload = report.payload.unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        Ok(())
    } else {
        let detail = report.detail.unwrap_or_else(|| "unknown error".to_string());
        anyhow::bail!("processing failed ({:?}): {}", report.error_kind, detail)
    }
}
