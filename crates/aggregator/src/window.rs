//! The per-window accumulator (§3 `WindowBuilder`). Pure state, no I/O.

use equity_core::entity::{Candle, Print};
use rust_decimal::Decimal;

pub(crate) struct WindowBuilder {
    underlying_id: String,
    interval_ms: i64,
    window_start: i64,
    open_price: Decimal,
    open_ts: i64,
    open_seq: i64,
    open_source_ts: i64,
    close_price: Decimal,
    close_ts: i64,
    close_seq: i64,
    close_ingest_ts: i64,
    high: Decimal,
    low: Decimal,
    volume: i64,
    trade_count: i64,
}

impl WindowBuilder {
    /// Seeds a brand-new builder from the print that opened it.
    pub(crate) fn from_print(interval_ms: i64, window_start: i64, print: &Print) -> Self {
        Self {
            underlying_id: print.underlying_id.clone(),
            interval_ms,
            window_start,
            open_price: print.price,
            open_ts: print.ts,
            open_seq: print.seq,
            open_source_ts: print.source_ts,
            close_price: print.price,
            close_ts: print.ts,
            close_seq: print.seq,
            close_ingest_ts: print.ingest_ts,
            high: print.price,
            low: print.price,
            volume: print.size,
            trade_count: 1,
        }
    }

    /// Folds a subsequent print into an already-open builder (§4.3 step 5).
    /// Ties in `ts` are broken by `seq`.
    pub(crate) fn fold(&mut self, print: &Print) {
        self.volume += print.size;
        self.trade_count += 1;
        self.high = self.high.max(print.price);
        self.low = self.low.min(print.price);

        if (print.ts, print.seq) < (self.open_ts, self.open_seq) {
            self.open_price = print.price;
            self.open_ts = print.ts;
            self.open_seq = print.seq;
            self.open_source_ts = print.source_ts;
        }
        if (print.ts, print.seq) > (self.close_ts, self.close_seq) {
            self.close_price = print.price;
            self.close_ts = print.ts;
            self.close_seq = print.seq;
            self.close_ingest_ts = print.ingest_ts;
        }
    }

    pub(crate) fn window_end(&self) -> i64 {
        self.window_start + self.interval_ms
    }

    pub(crate) fn into_candle(self) -> Candle {
        let trace_id = Candle::trace_id_for(&self.underlying_id, self.interval_ms, self.window_start);
        Candle {
            underlying_id: self.underlying_id,
            interval_ms: self.interval_ms,
            ts: self.window_start,
            open: self.open_price,
            high: self.high,
            low: self.low,
            close: self.close_price,
            volume: self.volume,
            trade_count: self.trade_count,
            source_ts: self.open_source_ts,
            ingest_ts: self.close_ingest_ts,
            seq: self.close_seq,
            trace_id,
        }
    }
}
