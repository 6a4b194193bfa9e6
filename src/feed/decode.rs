use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::protocol::{DiffEvent, PriceLevel, Snapshot};

#[derive(Deserialize, Debug)]
struct WireSnapshot {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    // Spot snapshots carry no event time.
    #[serde(rename = "E", default)]
    event_time: u64,
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Deserialize, Debug)]
struct WireDepthUpdate {
    #[serde(rename = "E")]
    event_time: u64,
    #[serde(rename = "U")]
    first_update_id: u64,
    #[serde(rename = "u")]
    final_update_id: u64,
    #[serde(rename = "pu", default)]
    prev_final_update_id: Option<u64>,
    #[serde(rename = "b")]
    bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    asks: Vec<(String, String)>,
}

// For combined streams, the payload is wrapped in {"stream": "...", "data": ...}
#[derive(Deserialize, Debug)]
struct CombinedStreamEvent<T> {
    #[allow(dead_code)]
    stream: String,
    data: T,
}

#[derive(Deserialize, Debug)]
struct SubscriptionAck {
    #[allow(dead_code)]
    id: u64,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    code: i64,
    msg: String,
}

/// Decodes a REST depth snapshot body.
pub fn decode_snapshot(body: &[u8]) -> Result<Snapshot> {
    let mut bytes = body.to_vec();
    let mut bytes_copy = bytes.clone();
    match simd_json::from_slice::<WireSnapshot>(&mut bytes) {
        Ok(wire) => Ok(Snapshot {
            last_update_id: wire.last_update_id,
            event_time_ms: wire.event_time,
            bids: parse_levels(&wire.bids)?,
            asks: parse_levels(&wire.asks)?,
        }),
        Err(e) => {
            if let Ok(api) = simd_json::from_slice::<ApiError>(&mut bytes_copy) {
                return Err(Error::Transport(format!(
                    "snapshot request rejected: {} ({})",
                    api.msg, api.code
                )));
            }
            Err(Error::Malformed(format!("snapshot: {e}")))
        }
    }
}

/// Decodes one text frame of the diff stream. Subscription acknowledgements
/// decode to `None`.
pub fn decode_stream_message(text: &[u8]) -> Result<Option<DiffEvent>> {
    // simd-json mutates its input, so every attempt gets its own copy.
    let mut bytes = text.to_vec();
    let mut bytes_copy1 = bytes.clone();
    let mut bytes_copy2 = bytes.clone();

    let wire = if let Ok(wire) = simd_json::from_slice::<WireDepthUpdate>(&mut bytes) {
        wire
    } else if let Ok(wrapper) =
        simd_json::from_slice::<CombinedStreamEvent<WireDepthUpdate>>(&mut bytes_copy1)
    {
        wrapper.data
    } else if simd_json::from_slice::<SubscriptionAck>(&mut bytes_copy2).is_ok() {
        return Ok(None);
    } else {
        let preview: String = String::from_utf8_lossy(text).chars().take(120).collect();
        return Err(Error::Malformed(format!("unrecognised stream message: {preview}")));
    };

    Ok(Some(DiffEvent {
        first_update_id: wire.first_update_id,
        final_update_id: wire.final_update_id,
        prev_final_update_id: wire.prev_final_update_id,
        event_time_ms: wire.event_time,
        bid_changes: parse_levels(&wire.bids)?,
        ask_changes: parse_levels(&wire.asks)?,
    }))
}

fn parse_levels(levels: &[(String, String)]) -> Result<Vec<PriceLevel>> {
    levels
        .iter()
        .map(|(price, size)| Ok(PriceLevel::new(parse_decimal(price)?, parse_decimal(size)?)))
        .collect()
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| Error::Malformed(format!("bad decimal {value:?}: {e}")))
}
