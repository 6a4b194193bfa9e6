use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid = 0,
    Ask = 1,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

/// A single price level. A size of zero means the level is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    pub fn is_removal(&self) -> bool {
        self.size <= Decimal::ZERO
    }
}

/// Point-in-time book state tagged with the server cursor it was taken at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_update_id: u64,
    pub event_time_ms: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// All book changes between `first_update_id` and `final_update_id`, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEvent {
    pub first_update_id: u64,
    pub final_update_id: u64,
    /// Final id of the previous event, when the venue publishes it.
    pub prev_final_update_id: Option<u64>,
    pub event_time_ms: u64,
    pub bid_changes: Vec<PriceLevel>,
    pub ask_changes: Vec<PriceLevel>,
}

impl DiffEvent {
    pub fn new(first_update_id: u64, final_update_id: u64, event_time_ms: u64) -> Self {
        Self {
            first_update_id,
            final_update_id,
            prev_final_update_id: None,
            event_time_ms,
            bid_changes: Vec::new(),
            ask_changes: Vec::new(),
        }
    }

    pub fn with_bids(mut self, levels: impl IntoIterator<Item = PriceLevel>) -> Self {
        self.bid_changes.extend(levels);
        self
    }

    pub fn with_asks(mut self, levels: impl IntoIterator<Item = PriceLevel>) -> Self {
        self.ask_changes.extend(levels);
        self
    }

    pub fn with_prev_final(mut self, prev_final_update_id: u64) -> Self {
        self.prev_final_update_id = Some(prev_final_update_id);
        self
    }

    pub fn change_count(&self) -> usize {
        self.bid_changes.len() + self.ask_changes.len()
    }
}

/// One inbound item from the transport, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Snapshot(Snapshot),
    Diff(DiffEvent),
}

/// What a transport task sends: an event, or the failure that ended the stream.
pub type FeedItem = crate::error::Result<FeedEvent>;
