//! Single-mutator run loop.
//!
//! The transport runs on its own task and pushes [`FeedItem`]s into a bounded
//! channel; this loop is the only place the engine is touched. Each item is
//! applied completely before the next one (or a shutdown signal) is looked at.

use log::{error, info};
use tokio::sync::{mpsc, watch};

use crate::engine::{EngineState, EngineStats, ReconciliationEngine};
use crate::error::{Error, Result};
use crate::history::HistoryRecorder;
use crate::protocol::{FeedEvent, FeedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The engine's stop condition was reached.
    StopCondition,
    /// Shutdown was signalled.
    Cancelled,
    /// The transport dropped its sender without reporting a failure.
    FeedClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub exit: ExitReason,
    pub state: EngineState,
    pub stats: EngineStats,
}

/// Drives `engine` from `rx` until it terminates, `shutdown` flips to `true`,
/// or the channel closes. The recorder is flushed on every exit path; a
/// transport failure is returned as the error after that flush.
pub async fn run_session<H: HistoryRecorder>(
    engine: &mut ReconciliationEngine<H>,
    rx: &mut mpsc::Receiver<FeedItem>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<SessionReport> {
    let mut shutdown_live = true;

    loop {
        if engine.is_terminated() {
            return Ok(report(engine, ExitReason::StopCondition));
        }
        if *shutdown.borrow() {
            info!("Shutdown requested; flushing history");
            engine.terminate()?;
            return Ok(report(engine, ExitReason::Cancelled));
        }

        tokio::select! {
            biased;
            changed = shutdown.changed(), if shutdown_live => {
                // A dropped sender can no longer cancel us; keep draining the feed.
                if changed.is_err() {
                    shutdown_live = false;
                }
            }
            item = rx.recv() => match item {
                Some(Ok(event)) => {
                    let applied = match &event {
                        FeedEvent::Snapshot(snapshot) => engine.apply_snapshot(snapshot),
                        FeedEvent::Diff(diff) => engine.apply_diff(diff),
                    };
                    if let Err(e) = applied {
                        return Err(fail(engine, e));
                    }
                }
                Some(Err(e)) => {
                    error!("Transport failure: {}", e);
                    return Err(fail(engine, e));
                }
                None => {
                    info!("Feed closed; flushing history");
                    engine.terminate()?;
                    return Ok(report(engine, ExitReason::FeedClosed));
                }
            },
        }
    }
}

fn fail<H: HistoryRecorder>(engine: &mut ReconciliationEngine<H>, err: Error) -> Error {
    if let Err(flush_err) = engine.terminate() {
        error!("Flush after failure also failed: {}", flush_err);
    }
    err
}

fn report<H: HistoryRecorder>(engine: &ReconciliationEngine<H>, exit: ExitReason) -> SessionReport {
    SessionReport {
        exit,
        state: engine.state(),
        stats: engine.stats(),
    }
}
