use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ethnum::U256;
use serde::Deserialize;

mod de;

#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    Io(String),
    /// Malformed record; carries the 1-based line number of the offender.
    InputShape { line: usize, reason: String },
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Io(e) => write!(f, "event stream io error: {e}"),
            EventError::InputShape { line, reason } => {
                write!(f, "malformed event record at line {line}: {reason}")
            }
        }
    }
}

impl std::error::Error for EventError {}

/// One record of the on-chain event stream. Unknown fields are tolerated;
/// numeric fields accept both JSON integers and decimal strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "eventType")]
pub enum EventRecord {
    Mint {
        #[serde(rename = "blockNumber", default)]
        block_number: u64,
        #[serde(rename = "blockTimestamp")]
        block_timestamp: i64,
        #[serde(rename = "logIndex", default)]
        log_index: u64,
        owner: String,
        #[serde(rename = "tickLower")]
        tick_lower: i32,
        #[serde(rename = "tickUpper")]
        tick_upper: i32,
        #[serde(with = "de::u128_flexible")]
        liquidity: u128,
        #[serde(with = "de::i128_flexible")]
        amount0: i128,
        #[serde(with = "de::i128_flexible")]
        amount1: i128,
    },
    Burn {
        #[serde(rename = "blockNumber", default)]
        block_number: u64,
        #[serde(rename = "blockTimestamp")]
        block_timestamp: i64,
        #[serde(rename = "logIndex", default)]
        log_index: u64,
        owner: String,
        #[serde(rename = "tickLower")]
        tick_lower: i32,
        #[serde(rename = "tickUpper")]
        tick_upper: i32,
        #[serde(with = "de::u128_flexible")]
        liquidity: u128,
    },
    Swap {
        #[serde(rename = "blockNumber", default)]
        block_number: u64,
        #[serde(rename = "blockTimestamp")]
        block_timestamp: i64,
        #[serde(rename = "logIndex", default)]
        log_index: u64,
        #[serde(with = "de::i128_flexible")]
        amount0: i128,
        #[serde(with = "de::i128_flexible")]
        amount1: i128,
        #[serde(rename = "sqrtPriceX96", with = "de::u256_flexible")]
        sqrt_price_x96: U256,
        #[serde(with = "de::u128_flexible")]
        liquidity: u128,
        tick: i32,
    },
}

impl EventRecord {
    pub fn block_timestamp(&self) -> i64 {
        match self {
            EventRecord::Mint {
                block_timestamp, ..
            }
            | EventRecord::Burn {
                block_timestamp, ..
            }
            | EventRecord::Swap {
                block_timestamp, ..
            } => *block_timestamp,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            EventRecord::Mint { block_number, .. }
            | EventRecord::Burn { block_number, .. }
            | EventRecord::Swap { block_number, .. } => *block_number,
        }
    }

    pub fn log_index(&self) -> u64 {
        match self {
            EventRecord::Mint { log_index, .. }
            | EventRecord::Burn { log_index, .. }
            | EventRecord::Swap { log_index, .. } => *log_index,
        }
    }

    /// Stable replay ordering: timestamp, then block, then log index.
    pub fn sort_key(&self) -> (i64, u64, u64) {
        (self.block_timestamp(), self.block_number(), self.log_index())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventRecord::Mint { .. } => "Mint",
            EventRecord::Burn { .. } => "Burn",
            EventRecord::Swap { .. } => "Swap",
        }
    }
}

/// Inclusive filters applied while reading the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
}

impl EventFilter {
    fn accepts(&self, record: &EventRecord) -> bool {
        let ts = record.block_timestamp();
        let block = record.block_number();
        self.start_timestamp.is_none_or(|start| ts >= start)
            && self.end_timestamp.is_none_or(|end| ts <= end)
            && self.start_block.is_none_or(|start| block >= start)
            && self.end_block.is_none_or(|end| block <= end)
    }
}

/// Reads a JSONL event file, applies the filter, and returns records in
/// stable replay order. A malformed line fails the whole read.
pub fn read_events(path: &Path, filter: &EventFilter) -> Result<Vec<EventRecord>, EventError> {
    let file = File::open(path).map_err(|e| EventError::Io(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EventError::Io(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: EventRecord =
            serde_json::from_str(trimmed).map_err(|e| EventError::InputShape {
                line: index + 1,
                reason: e.to_string(),
            })?;
        if filter.accepts(&record) {
            records.push(record);
        }
    }

    records.sort_by_key(|record| record.sort_key());
    Ok(records)
}

/// Per-type counts and coverage of a stream, for the `stats` subcommand.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StreamStats {
    pub total: usize,
    pub mints: usize,
    pub burns: usize,
    pub swaps: usize,
    pub first_block: Option<u64>,
    pub last_block: Option<u64>,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

pub fn stream_stats(records: &[EventRecord]) -> StreamStats {
    let mut stats = StreamStats {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        match record {
            EventRecord::Mint { .. } => stats.mints += 1,
            EventRecord::Burn { .. } => stats.burns += 1,
            EventRecord::Swap { .. } => stats.swaps += 1,
        }
        let block = record.block_number();
        let ts = record.block_timestamp();
        stats.first_block = Some(stats.first_block.map_or(block, |b| b.min(block)));
        stats.last_block = Some(stats.last_block.map_or(block, |b| b.max(block)));
        stats.first_timestamp = Some(stats.first_timestamp.map_or(ts, |t| t.min(ts)));
        stats.last_timestamp = Some(stats.last_timestamp.map_or(ts, |t| t.max(ts)));
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_swap_with_string_and_number_fields() {
        let line = r#"{"eventType":"Swap","blockNumber":100,"blockTimestamp":1700000000,
            "transactionHash":"0xabc","amount0":"1000000","amount1":-987654,
            "sqrtPriceX96":"2647716747342176519581615684608","liquidity":"5000000",
            "tick":70123,"extraField":true}"#
            .replace('\n', " ");
        let record: EventRecord = serde_json::from_str(&line).unwrap();
        match record {
            EventRecord::Swap {
                amount0,
                amount1,
                tick,
                liquidity,
                ..
            } => {
                assert_eq!(amount0, 1_000_000);
                assert_eq!(amount1, -987_654);
                assert_eq!(tick, 70123);
                assert_eq!(liquidity, 5_000_000);
            }
            other => panic!("expected swap, got {other:?}"),
        }
    }

    #[test]
    fn decodes_mint_and_tolerates_unknown_fields() {
        let line = r#"{"eventType":"Mint","blockNumber":1,"blockTimestamp":5,
            "owner":"0xdeadbeef","tickLower":-60,"tickUpper":60,
            "liquidity":123,"amount0":10,"amount1":20,"sender":"0x1"}"#
            .replace('\n', " ");
        let record: EventRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(record.kind(), "Mint");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let line = r#"{"eventType":"Swap","blockTimestamp":5,"amount0":1,"amount1":-1,
            "liquidity":0,"tick":0}"#
            .replace('\n', " ");
        assert!(serde_json::from_str::<EventRecord>(&line).is_err());
    }

    #[test]
    fn sort_key_orders_by_timestamp_block_log_index() {
        let early = EventRecord::Burn {
            block_number: 2,
            block_timestamp: 10,
            log_index: 0,
            owner: "0x1".into(),
            tick_lower: 0,
            tick_upper: 60,
            liquidity: 1,
        };
        let late = EventRecord::Burn {
            block_number: 1,
            block_timestamp: 11,
            log_index: 0,
            owner: "0x1".into(),
            tick_lower: 0,
            tick_upper: 60,
            liquidity: 1,
        };
        assert!(early.sort_key() < late.sort_key());
    }
}
