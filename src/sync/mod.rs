//! Snapshot/stream synchronization gate.
//!
//! A diff stream is only safe to apply once one event straddles the snapshot
//! cursor: `U <= lastUpdateId + 1 <= u`. Earlier events are dropped silently.
//! After that the gate keeps admitting events and reports any break in
//! continuity as a [`SequenceGap`] without refusing the event.

use crate::error::{Error, Result};
use crate::protocol::DiffEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    AwaitingSnapshot,
    AwaitingFirstValidDiff,
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub phase: SyncPhase,
    /// Snapshot cursor until the first admission, then the final id of the
    /// last admitted event.
    pub last_applied_cursor: u64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::AwaitingSnapshot,
            last_applied_cursor: 0,
        }
    }
}

/// At least one diff went missing between two admitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// `lastAppliedCursor + 1` at the time of the check.
    pub expected: u64,
    /// First update id of the offending event.
    pub received: u64,
    /// Final id of the event the venue claims came before, if published.
    pub prev_final: Option<u64>,
}

impl SequenceGap {
    pub fn missing(&self) -> u64 {
        self.received.saturating_sub(self.expected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No snapshot has been consumed yet.
    NoBaseline,
    /// Event ends at or before the snapshot cursor.
    Stale,
    /// Event starts after the snapshot cursor; the straddling event was missed.
    Ahead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted {
        /// This event moved the gate into `Synced`.
        bootstrap: bool,
        gap: Option<SequenceGap>,
    },
    Rejected(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }

    pub fn gap(&self) -> Option<SequenceGap> {
        match self {
            Admission::Admitted { gap, .. } => *gap,
            Admission::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncGate {
    state: SyncState,
    snapshot_cursor: Option<u64>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.phase
    }

    pub fn snapshot_cursor(&self) -> Option<u64> {
        self.snapshot_cursor
    }

    pub fn is_synced(&self) -> bool {
        self.state.phase == SyncPhase::Synced
    }

    /// Records the snapshot cursor as the synchronization baseline.
    pub fn initialize(&mut self, snapshot_cursor: u64) -> Result<()> {
        if self.state.phase != SyncPhase::AwaitingSnapshot {
            return Err(Error::AlreadyInitialized);
        }
        self.snapshot_cursor = Some(snapshot_cursor);
        self.state = SyncState {
            phase: SyncPhase::AwaitingFirstValidDiff,
            last_applied_cursor: snapshot_cursor,
        };
        Ok(())
    }

    pub fn admit(&mut self, event: &DiffEvent) -> Admission {
        match self.state.phase {
            SyncPhase::AwaitingSnapshot => Admission::Rejected(Rejection::NoBaseline),
            SyncPhase::AwaitingFirstValidDiff => {
                let next = self.state.last_applied_cursor.saturating_add(1);
                if event.final_update_id < next {
                    return Admission::Rejected(Rejection::Stale);
                }
                if event.first_update_id > next {
                    return Admission::Rejected(Rejection::Ahead);
                }
                self.state = SyncState {
                    phase: SyncPhase::Synced,
                    last_applied_cursor: event.final_update_id,
                };
                Admission::Admitted {
                    bootstrap: true,
                    gap: None,
                }
            }
            SyncPhase::Synced => {
                let last = self.state.last_applied_cursor;
                let expected = last.saturating_add(1);
                let prev_mismatch = event
                    .prev_final_update_id
                    .is_some_and(|prev_final| prev_final != last);
                let gap = (event.first_update_id > expected || prev_mismatch).then_some(
                    SequenceGap {
                        expected,
                        received: event.first_update_id,
                        prev_final: event.prev_final_update_id,
                    },
                );
                self.state.last_applied_cursor = event.final_update_id;
                Admission::Admitted {
                    bootstrap: false,
                    gap,
                }
            }
        }
    }
}
