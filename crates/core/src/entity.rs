//! Print, Quote and Candle — the three wire/storage entities that flow
//! through the pipeline, plus the schema validation performed on all of them
//! at the ingest and emit boundaries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An executed equity trade.
///
/// # Invariants
/// - `underlying_id` is uppercase ASCII.
/// - `price` is strictly positive, `size` is a strictly positive share count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Print {
    pub underlying_id: String,
    pub ts: i64,
    pub seq: i64,
    pub source_ts: i64,
    pub ingest_ts: i64,
    pub trace_id: String,
    pub price: Decimal,
    pub size: i64,
    pub exchange: String,
    pub off_exchange_flag: bool,
}

/// A top-of-book NBBO snapshot.
///
/// # Invariants
/// - Same temporal/identity fields as [`Print`].
/// - `ask >= bid + min_tick` for the venue's minimum tick size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub underlying_id: String,
    pub ts: i64,
    pub seq: i64,
    pub source_ts: i64,
    pub ingest_ts: i64,
    pub trace_id: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub exchange: String,
    pub off_exchange_flag: bool,
}

/// A fixed-interval OHLCV bar.
///
/// # Invariants
/// - `window_start <= openTs <= closeTs < window_start + interval_ms`.
/// - `high >= max(open, close)`, `low <= min(open, close)`.
/// - `volume > 0`, `trade_count >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub underlying_id: String,
    pub interval_ms: i64,
    pub ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub trade_count: i64,
    pub source_ts: i64,
    pub ingest_ts: i64,
    pub seq: i64,
    pub trace_id: String,
}

impl Candle {
    /// `trace_id` formatted per the spec: `candle:{symbol}:{interval_ms}:{window_start}`.
    pub fn trace_id_for(underlying_id: &str, interval_ms: i64, window_start: i64) -> String {
        format!("candle:{underlying_id}:{interval_ms}:{window_start}")
    }
}

/// Schema validation failure on an inbound or outbound entity. Inbound
/// failures are poison-pill discards at the bus boundary; outbound failures
/// abort the single entity that failed (§7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be uppercase ASCII, got {value:?}")]
    NotUppercaseAscii { field: &'static str, value: String },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: Decimal },
    #[error("{field} must be positive, got {value}")]
    NotPositiveInt { field: &'static str, value: i64 },
    #[error("ask ({ask}) must be >= bid ({bid}) + min_tick ({min_tick})")]
    InvalidSpread {
        bid: Decimal,
        ask: Decimal,
        min_tick: Decimal,
    },
    #[error("candle invariant violated: {0}")]
    CandleInvariant(String),
}

fn is_uppercase_ascii(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Validates a [`Print`] against the schema invariants in §3.
pub fn validate_print(print: &Print) -> Result<(), ValidationError> {
    if !is_uppercase_ascii(&print.underlying_id) {
        return Err(ValidationError::NotUppercaseAscii {
            field: "underlying_id",
            value: print.underlying_id.clone(),
        });
    }
    if print.price <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "price",
            value: print.price,
        });
    }
    if print.size <= 0 {
        return Err(ValidationError::NotPositiveInt {
            field: "size",
            value: print.size,
        });
    }
    Ok(())
}

/// Validates a [`Quote`] against the schema invariants in §3.
pub fn validate_quote(quote: &Quote, min_tick: Decimal) -> Result<(), ValidationError> {
    if !is_uppercase_ascii(&quote.underlying_id) {
        return Err(ValidationError::NotUppercaseAscii {
            field: "underlying_id",
            value: quote.underlying_id.clone(),
        });
    }
    if quote.bid <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "bid",
            value: quote.bid,
        });
    }
    if quote.ask <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "ask",
            value: quote.ask,
        });
    }
    if quote.ask < quote.bid + min_tick {
        return Err(ValidationError::InvalidSpread {
            bid: quote.bid,
            ask: quote.ask,
            min_tick,
        });
    }
    Ok(())
}

/// Validates a [`Candle`] before it is allowed to reach any sink (§3 invariant 6).
pub fn validate_candle(candle: &Candle) -> Result<(), ValidationError> {
    if candle.high < candle.open.max(candle.close) {
        return Err(ValidationError::CandleInvariant(format!(
            "high {} < max(open {}, close {})",
            candle.high, candle.open, candle.close
        )));
    }
    if candle.low > candle.open.min(candle.close) {
        return Err(ValidationError::CandleInvariant(format!(
            "low {} > min(open {}, close {})",
            candle.low, candle.open, candle.close
        )));
    }
    if candle.volume <= 0 {
        return Err(ValidationError::NotPositiveInt {
            field: "volume",
            value: candle.volume,
        });
    }
    if candle.trade_count < 1 {
        return Err(ValidationError::NotPositiveInt {
            field: "trade_count",
            value: candle.trade_count,
        });
    }
    Ok(())
}
