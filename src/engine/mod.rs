use log::{debug, error, info, warn};

use crate::book::PriceLevelBook;
use crate::error::{Error, Result};
use crate::history::HistoryRecorder;
use crate::protocol::{DiffEvent, Side, Snapshot};
use crate::record::{BookStateRecord, RecordKind};
use crate::sync::{Admission, Rejection, SequenceGap, SyncGate};

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Bootstrapping,
    Streaming,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopCondition {
    /// Terminate once this many diff events have been applied.
    pub max_events: Option<u64>,
}

impl StopCondition {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn after_events(max_events: u64) -> Self {
        Self {
            max_events: Some(max_events),
        }
    }

    fn reached(&self, applied: u64) -> bool {
        self.max_events.is_some_and(|max| applied >= max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Diff events applied (the snapshot is not counted).
    pub applied: u64,
    pub discarded: u64,
    pub gaps: u64,
    pub last_gap: Option<SequenceGap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A record with this ordinal was handed to the recorder.
    Applied {
        ordinal: u64,
        gap: Option<SequenceGap>,
    },
    Discarded(Rejection),
}

impl Outcome {
    pub fn gap(&self) -> Option<SequenceGap> {
        match self {
            Outcome::Applied { gap, .. } => *gap,
            Outcome::Discarded(_) => None,
        }
    }
}

/// Owns the book and the sync gate for one run; every event goes through here.
pub struct ReconciliationEngine<H: HistoryRecorder> {
    book: PriceLevelBook,
    gate: SyncGate,
    state: EngineState,
    next_ordinal: u64,
    stop: StopCondition,
    recorder: H,
    stats: EngineStats,
    progress_interval: u64,
}

impl<H: HistoryRecorder> ReconciliationEngine<H> {
    pub fn new(recorder: H, stop: StopCondition) -> Self {
        Self {
            book: PriceLevelBook::new(),
            gate: SyncGate::new(),
            state: EngineState::Idle,
            next_ordinal: 0,
            stop,
            recorder,
            stats: EngineStats::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == EngineState::Terminated
    }

    pub fn book(&self) -> &PriceLevelBook {
        &self.book
    }

    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn stop_condition(&self) -> StopCondition {
        self.stop
    }

    pub fn recorder(&self) -> &H {
        &self.recorder
    }

    /// Consumes the engine and hands back the recorder. Does not flush.
    pub fn into_recorder(self) -> H {
        self.recorder
    }

    /// Seeds the book from `snapshot` and emits the bootstrap record (ordinal 0).
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Result<Outcome> {
        match self.state {
            EngineState::Idle => {}
            EngineState::Terminated => return Err(Error::Terminated),
            EngineState::Bootstrapping | EngineState::Streaming => {
                return Err(Error::UnexpectedSnapshot)
            }
        }

        self.book.apply_levels(Side::Bid, &snapshot.bids);
        self.book.apply_levels(Side::Ask, &snapshot.asks);
        self.gate.initialize(snapshot.last_update_id)?;
        self.state = EngineState::Bootstrapping;

        info!(
            "Snapshot consumed: lastUpdateId={} bids={} asks={}",
            snapshot.last_update_id,
            self.book.bids().len(),
            self.book.asks().len()
        );

        let cursor = (snapshot.last_update_id, snapshot.last_update_id);
        let ordinal = self.emit(RecordKind::Bootstrap, snapshot.event_time_ms, cursor)?;
        Ok(Outcome::Applied { ordinal, gap: None })
    }

    /// Runs `event` through the gate and, if admitted, applies it atomically.
    /// A recorder failure terminates the engine.
    pub fn apply_diff(&mut self, event: &DiffEvent) -> Result<Outcome> {
        if self.state == EngineState::Terminated {
            return Err(Error::Terminated);
        }

        let gap = match self.gate.admit(event) {
            Admission::Rejected(reason) => {
                self.stats.discarded += 1;
                debug!(
                    "Discarded diff U={} u={} ({:?})",
                    event.first_update_id, event.final_update_id, reason
                );
                return Ok(Outcome::Discarded(reason));
            }
            Admission::Admitted { bootstrap, gap } => {
                if bootstrap {
                    info!(
                        "Stream synced at U={} u={} after {} discarded events",
                        event.first_update_id, event.final_update_id, self.stats.discarded
                    );
                }
                gap
            }
        };

        if let Some(gap) = gap {
            self.stats.gaps += 1;
            self.stats.last_gap = Some(gap);
            warn!(
                "Sequence gap: expected U={} got U={} (pu={:?}); continuing",
                gap.expected, gap.received, gap.prev_final
            );
        }

        self.book.apply_levels(Side::Bid, &event.bid_changes);
        self.book.apply_levels(Side::Ask, &event.ask_changes);
        self.state = EngineState::Streaming;

        let cursor = (event.first_update_id, event.final_update_id);
        let ordinal = self.emit(RecordKind::Diff, event.event_time_ms, cursor)?;
        self.stats.applied += 1;

        if self.progress_interval > 0 && self.stats.applied % self.progress_interval == 0 {
            info!(
                "Processed update {} (levels={} gaps={})",
                ordinal,
                self.book.level_count(),
                self.stats.gaps
            );
        }

        if self.stop.reached(self.stats.applied) {
            info!("Stop condition reached after {} events", self.stats.applied);
            self.terminate()?;
        }

        Ok(Outcome::Applied { ordinal, gap })
    }

    /// Flushes the recorder and refuses further events. Safe to call twice.
    pub fn terminate(&mut self) -> Result<()> {
        if self.state == EngineState::Terminated {
            return Ok(());
        }
        self.state = EngineState::Terminated;
        info!(
            "Terminating: records={} applied={} discarded={} gaps={}",
            self.next_ordinal, self.stats.applied, self.stats.discarded, self.stats.gaps
        );
        self.recorder.flush()
    }

    fn emit(&mut self, kind: RecordKind, event_time_ms: u64, cursor: (u64, u64)) -> Result<u64> {
        let ordinal = self.next_ordinal;
        let record = BookStateRecord::from_view(
            kind,
            ordinal,
            event_time_ms,
            cursor,
            self.book.snapshot_view(),
        );
        if let Err(e) = self.recorder.record(record) {
            // Book and gate already include this event, so the history now has a hole.
            error!("Failed to record state {}: {}; terminating", ordinal, e);
            self.state = EngineState::Terminated;
            if let Err(flush_err) = self.recorder.flush() {
                error!("Flush after record failure also failed: {}", flush_err);
            }
            return Err(e);
        }
        self.next_ordinal += 1;
        Ok(ordinal)
    }
}
