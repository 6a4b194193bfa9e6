use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

use depthsync::config::{HistoryLayout, SessionConfig};
use depthsync::feed::BinanceDepthFeed;
use depthsync::history::{BookParquetHistory, HistoryRecorder, LevelParquetHistory};
use depthsync::session::run_session;
use depthsync::ReconciliationEngine;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconstruct an order book from a depth snapshot and diff stream", long_about = None)]
struct Args {
    /// JSON config file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instrument symbol (e.g. SOLUSDT)
    #[arg(short, long)]
    symbol: Option<String>,

    /// REST depth endpoint
    #[arg(long)]
    rest_url: Option<String>,

    /// WebSocket base URL
    #[arg(long)]
    ws_url: Option<String>,

    /// Snapshot depth limit
    #[arg(long)]
    depth_limit: Option<u32>,

    /// Diff push interval in milliseconds
    #[arg(long)]
    speed_ms: Option<u32>,

    /// Stop after this many applied diffs (0 runs until Ctrl-C)
    #[arg(long)]
    max_events: Option<u64>,

    /// Output parquet path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// History layout: book | levels
    #[arg(long)]
    layout: Option<HistoryLayout>,

    /// Records per parquet row group
    #[arg(long)]
    batch_rows: Option<usize>,

    /// CPU core to pin the process to
    #[arg(long)]
    core_id: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(symbol) = self.symbol {
            config.symbol = symbol;
        }
        if let Some(rest_url) = self.rest_url {
            config.rest_url = rest_url;
        }
        if let Some(ws_url) = self.ws_url {
            config.ws_url = ws_url;
        }
        if let Some(depth_limit) = self.depth_limit {
            config.depth_limit = depth_limit;
        }
        if let Some(speed_ms) = self.speed_ms {
            config.update_speed_ms = speed_ms;
        }
        if let Some(max_events) = self.max_events {
            config.max_events = (max_events > 0).then_some(max_events);
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(batch_rows) = self.batch_rows {
            config.batch_rows = batch_rows;
        }
        Ok(config)
    }
}

fn open_history(config: &SessionConfig) -> Result<Box<dyn HistoryRecorder>> {
    let recorder: Box<dyn HistoryRecorder> = match config.layout {
        HistoryLayout::Book => Box::new(BookParquetHistory::create(&config.output, config.batch_rows)?),
        HistoryLayout::Levels => Box::new(LevelParquetHistory::create(&config.output, config.batch_rows)?),
    };
    Ok(recorder)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(core_id) = args.core_id {
        let core_ids = core_affinity::get_core_ids().context("Failed to get core IDs")?;
        if core_id < core_ids.len() {
            info!("Pinning process to core {}", core_id);
            core_affinity::set_for_current(core_ids[core_id]);
        } else {
            anyhow::bail!("Core ID {} out of range ({} cores available)", core_id, core_ids.len());
        }
    }

    let config = args.into_config()?;
    info!("Starting depth sync for {}", config.symbol);
    info!("Snapshot: {}", config.snapshot_url());
    info!("Stream: {}", config.stream_url());
    info!("Output: {} ({:?})", config.output.display(), config.layout);

    let recorder = open_history(&config)
        .with_context(|| format!("Failed to create {}", config.output.display()))?;
    let mut engine = ReconciliationEngine::new(recorder, config.stop_condition())
        .with_progress_interval(config.progress_interval);

    let feed = BinanceDepthFeed::new(&config).context("Failed to set up feed")?;
    let (tx, mut rx) = mpsc::channel(config.channel_capacity.max(1));
    let feed_task = tokio::spawn(feed.run(tx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received");
            let _ = shutdown_tx.send(true);
        }
    });

    let result = run_session(&mut engine, &mut rx, shutdown_rx).await;
    feed_task.abort();

    match result {
        Ok(report) => {
            info!(
                "Session ended ({:?}): applied={} discarded={} gaps={}",
                report.exit, report.stats.applied, report.stats.discarded, report.stats.gaps
            );
            info!("History written to {}", config.output.display());
            Ok(())
        }
        Err(e) => {
            error!("Session failed: {}", e);
            Err(e).context("Depth sync run failed")
        }
    }
}
