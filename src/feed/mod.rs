//! Transport side: turns venue payloads into [`FeedEvent`]s and hands them to
//! the single engine task over a channel. Nothing here touches the book.

pub mod binance;
pub mod decode;

pub use crate::protocol::{FeedEvent, FeedItem};
pub use binance::BinanceDepthFeed;
