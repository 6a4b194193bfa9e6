//! Order book reconstruction from a depth snapshot plus an incremental diff stream.
//!
//! The core (`book`, `sync`, `engine`) is synchronous and allocation-light; the
//! transport (`feed`), the channel-driven run loop (`session`) and the columnar
//! export (`history`) sit behind cargo features.

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(feature = "feed")]
pub mod feed;
pub mod history;
pub mod protocol;
pub mod record;
#[cfg(feature = "runtime")]
pub mod session;
pub mod sync;

pub use book::{BookView, PriceLevelBook};
pub use config::{HistoryLayout, SessionConfig};
pub use engine::{EngineState, EngineStats, Outcome, ReconciliationEngine, StopCondition};
pub use error::{Error, Result};
pub use history::{HistoryRecorder, MemoryHistory};
pub use protocol::{DiffEvent, PriceLevel, Side, Snapshot};
pub use record::{BookStateRecord, RecordKind};
pub use sync::{Admission, Rejection, SequenceGap, SyncGate, SyncPhase, SyncState};
