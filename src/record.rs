use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::BookView;
use crate::protocol::PriceLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Bootstrap,
    Diff,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Bootstrap => "bootstrap",
            RecordKind::Diff => "diff",
        }
    }
}

/// Materialized book state after one applied snapshot or diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStateRecord {
    pub kind: RecordKind,
    /// 0 for the snapshot, then +1 per applied diff.
    pub ordinal: u64,
    pub event_time_ms: u64,
    /// Cursor range that produced this state. Both equal the snapshot's
    /// `lastUpdateId` for the bootstrap record.
    pub first_update_id: u64,
    pub final_update_id: u64,
    /// Descending by price.
    pub bids: Vec<PriceLevel>,
    /// Ascending by price.
    pub asks: Vec<PriceLevel>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub midprice: Option<Decimal>,
    pub length: usize,
}

impl BookStateRecord {
    pub fn from_view(
        kind: RecordKind,
        ordinal: u64,
        event_time_ms: u64,
        cursor: (u64, u64),
        view: BookView,
    ) -> Self {
        let best_bid = view.best_bid();
        let best_ask = view.best_ask();
        let spread = view.spread();
        let midprice = view.midprice();
        let length = view.len();
        let BookView { bids, asks } = view;
        Self {
            kind,
            ordinal,
            event_time_ms,
            first_update_id: cursor.0,
            final_update_id: cursor.1,
            bids,
            asks,
            best_bid,
            best_ask,
            spread,
            midprice,
            length,
        }
    }

    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid, self.best_ask), (Some(bid), Some(ask)) if bid >= ask)
    }
}
