use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::protocol::{PriceLevel, Side};

/// Two-sided price -> resting size mapping. Never stores a size <= 0.
#[derive(Debug, Default, Clone)]
pub struct PriceLevelBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl PriceLevelBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bids(&self) -> &BTreeMap<Decimal, Decimal> {
        &self.bids
    }

    pub fn asks(&self) -> &BTreeMap<Decimal, Decimal> {
        &self.asks
    }

    /// Inserts or overwrites `price`, or removes it when `size` is zero.
    /// Removing an absent price is a no-op.
    pub fn apply_level(&mut self, side: Side, price: Decimal, size: Decimal) {
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if size <= Decimal::ZERO {
            levels.remove(&price);
        } else {
            levels.insert(price, size);
        }
    }

    pub fn apply_levels<'a, I>(&mut self, side: Side, levels: I)
    where
        I: IntoIterator<Item = &'a PriceLevel>,
    {
        for level in levels {
            self.apply_level(side, level.price, level.size);
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next_back()
            .map(|(&price, &size)| PriceLevel::new(price, size))
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(&price, &size)| PriceLevel::new(price, size))
    }

    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Sorted copy of the book: bids descending, asks ascending.
    pub fn snapshot_view(&self) -> BookView {
        BookView {
            bids: self
                .bids
                .iter()
                .rev()
                .map(|(&price, &size)| PriceLevel::new(price, size))
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(&price, &size)| PriceLevel::new(price, size))
                .collect(),
        }
    }
}

/// Immutable, fully sorted materialization of a [`PriceLevelBook`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookView {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl BookView {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    /// `best_ask - best_bid`; negative on a crossed book. Absent if either side
    /// is empty or the difference does not fit in a `Decimal`.
    pub fn spread(&self) -> Option<Decimal> {
        self.best_ask()?.checked_sub(self.best_bid()?)
    }

    /// Absent if either side is empty or the sum overflows.
    pub fn midprice(&self) -> Option<Decimal> {
        self.best_bid()?
            .checked_add(self.best_ask()?)?
            .checked_div(Decimal::TWO)
    }

    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
