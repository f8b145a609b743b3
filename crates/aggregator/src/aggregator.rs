//! The candle aggregation kernel (C3, §4.3). Pure in-memory state machine:
//! no I/O, no shared mutability beyond `&mut self`. Callers serialise
//! `ingest`/`drain` calls (§5 concurrency model).

use crate::window::WindowBuilder;
use equity_core::entity::{Candle, Print};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Result of folding one print into every configured interval.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub emitted: Vec<Candle>,
    pub dropped_late: usize,
}

struct IntervalState {
    last_ts_seen: i64,
    builders: BTreeMap<i64, WindowBuilder>,
}

impl IntervalState {
    fn new() -> Self {
        Self {
            last_ts_seen: i64::MIN,
            builders: BTreeMap::new(),
        }
    }
}

/// Multi-interval, out-of-order-tolerant, watermark-driven windowed reducer.
///
/// One [`IntervalState`] is kept per `(underlying_id, interval_ms)` pair ever
/// observed; an implementation MAY garbage-collect idle symbols, but this one
/// does not (§4.3 memory bound note).
pub struct CandleAggregator {
    intervals_ms: Vec<i64>,
    max_late_ms: i64,
    states: BTreeMap<(String, i64), IntervalState>,
}

impl CandleAggregator {
    /// Normalises `intervals_ms` (positive, deduplicated, ascending) and
    /// floors `max_late_ms` to a non-negative integer.
    pub fn new(intervals_ms: impl IntoIterator<Item = i64>, max_late_ms: i64) -> Self {
        let mut intervals: Vec<i64> = intervals_ms.into_iter().filter(|ms| *ms > 0).collect();
        intervals.sort_unstable();
        intervals.dedup();
        Self {
            intervals_ms: intervals,
            max_late_ms: max_late_ms.max(0),
            states: BTreeMap::new(),
        }
    }

    pub fn intervals_ms(&self) -> &[i64] {
        &self.intervals_ms
    }

    /// Folds one print into every configured interval, in ascending order.
    pub fn ingest(&mut self, print: &Print) -> IngestOutcome {
        let mut emitted = Vec::new();
        let mut dropped_late = 0usize;

        for interval_ms in self.intervals_ms.clone() {
            let key = (print.underlying_id.clone(), interval_ms);
            let state = self.states.entry(key).or_insert_with(IntervalState::new);

            state.last_ts_seen = state.last_ts_seen.max(print.ts);
            let watermark = (state.last_ts_seen - self.max_late_ms).max(0);

            let window_start = print.ts.div_euclid(interval_ms) * interval_ms;
            let window_end = window_start + interval_ms;

            let builder_exists = state.builders.contains_key(&window_start);
            if window_end <= watermark && !builder_exists {
                // A late print that would have to open a brand-new window
                // past the watermark is dropped. One already open for this
                // window_start is still admitted (§4.3 step 4, §9 open
                // question: this is intentionally order-dependent).
                dropped_late += 1;
                continue;
            }

            match state.builders.entry(window_start) {
                Entry::Vacant(v) => {
                    v.insert(WindowBuilder::from_print(interval_ms, window_start, print));
                }
                Entry::Occupied(mut o) => {
                    o.get_mut().fold(print);
                }
            }

            let closed: Vec<i64> = state
                .builders
                .iter()
                .filter(|(_, builder)| builder.window_end() <= watermark)
                .map(|(window_start, _)| *window_start)
                .collect();

            for window_start in closed {
                if let Some(builder) = state.builders.remove(&window_start) {
                    emitted.push(builder.into_candle());
                }
            }
        }

        IngestOutcome { emitted, dropped_late }
    }

    /// Terminal flush: emits every remaining open window across every
    /// interval state, bypassing the watermark, and clears all state.
    /// Idempotent — a second call returns an empty vector.
    pub fn drain(&mut self) -> Vec<Candle> {
        let mut emitted = Vec::new();
        for state in self.states.values_mut() {
            let window_starts: Vec<i64> = state.builders.keys().copied().collect();
            for window_start in window_starts {
                if let Some(builder) = state.builders.remove(&window_start) {
                    emitted.push(builder.into_candle());
                }
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn print(ts: i64, price: Decimal, size: i64, seq: i64) -> Print {
        Print {
            underlying_id: "AAPL".to_string(),
            ts,
            seq,
            source_ts: ts,
            ingest_ts: ts,
            trace_id: format!("p{seq}"),
            price,
            size,
            exchange: "N".to_string(),
            off_exchange_flag: false,
        }
    }

    #[test]
    fn basic_ohlc_emits_on_third_print() {
        let mut agg = CandleAggregator::new([1000], 0);
        assert!(agg.ingest(&print(1000, dec!(10), 100, 1)).emitted.is_empty());
        assert!(agg.ingest(&print(1500, dec!(12), 50, 2)).emitted.is_empty());

        let outcome = agg.ingest(&print(2500, dec!(11), 10, 3));
        assert_eq!(outcome.emitted.len(), 1);
        let candle = &outcome.emitted[0];
        assert_eq!(candle.ts, 1000);
        assert_eq!(candle.open, dec!(10));
        assert_eq!(candle.high, dec!(12));
        assert_eq!(candle.low, dec!(10));
        assert_eq!(candle.close, dec!(12));
        assert_eq!(candle.volume, 150);
        assert_eq!(candle.trade_count, 2);
        assert_eq!(candle.seq, 2);
        assert_eq!(candle.source_ts, 1000);
        assert_eq!(candle.ingest_ts, 1500);
    }

    #[test]
    fn out_of_order_within_admitted_window_drains_correctly() {
        let mut agg = CandleAggregator::new([1000], 2000);
        assert!(agg.ingest(&print(1500, dec!(15), 10, 2)).emitted.is_empty());
        assert!(agg.ingest(&print(1200, dec!(11), 20, 1)).emitted.is_empty());

        let drained = agg.drain();
        assert_eq!(drained.len(), 1);
        let candle = &drained[0];
        assert_eq!(candle.open, dec!(11));
        assert_eq!(candle.close, dec!(15));
        assert_eq!(candle.trade_count, 2);
        assert_eq!(candle.seq, 2);
        assert_eq!(candle.source_ts, 1200);
        assert_eq!(candle.ingest_ts, 1500);
    }

    #[test]
    fn late_print_after_close_is_dropped() {
        let mut agg = CandleAggregator::new([1000], 0);
        assert!(agg.ingest(&print(1000, dec!(10), 100, 1)).emitted.is_empty());

        let second = agg.ingest(&print(3000, dec!(14), 50, 2));
        assert_eq!(second.emitted.len(), 1);
        assert_eq!(second.emitted[0].ts, 1000);
        assert_eq!(second.dropped_late, 0);

        let third = agg.ingest(&print(1500, dec!(9), 25, 3));
        assert!(third.emitted.is_empty());
        assert_eq!(third.dropped_late, 1);
    }

    #[test]
    fn multi_interval_fan_out() {
        let mut agg = CandleAggregator::new([1000, 5000], 0);
        let first = agg.ingest(&print(1000, dec!(10), 1, 1));
        assert!(first.emitted.is_empty());

        let second = agg.ingest(&print(4500, dec!(12), 1, 2));
        assert_eq!(second.emitted.len(), 1);
        assert_eq!(second.emitted[0].interval_ms, 1000);
        assert_eq!(second.emitted[0].ts, 1000);
        assert_eq!(second.emitted[0].close, dec!(10));

        let third = agg.ingest(&print(6000, dec!(8), 1, 3));
        // both the 1000ms window at ts=4000 and the 5000ms window at ts=0
        // close on this print, since every interval observes every print.
        assert_eq!(third.emitted.len(), 2);
        let ms1000 = third.emitted.iter().find(|c| c.interval_ms == 1000).expect("1000ms candle");
        assert_eq!(ms1000.ts, 4000);
        assert_eq!(ms1000.close, dec!(12));

        let ms5000 = third.emitted.iter().find(|c| c.interval_ms == 5000).expect("5000ms candle");
        assert_eq!(ms5000.ts, 0);
        assert_eq!(ms5000.open, dec!(10));
        assert_eq!(ms5000.high, dec!(12));
        assert_eq!(ms5000.low, dec!(10));
        assert_eq!(ms5000.close, dec!(12));
        assert_eq!(ms5000.volume, 2);
        assert_eq!(ms5000.trade_count, 2);
    }

    #[test]
    fn tie_break_by_seq_regardless_of_arrival_order() {
        let mut agg = CandleAggregator::new([1000], 0);
        agg.ingest(&print(2000, dec!(20), 1, 2));
        agg.ingest(&print(2000, dec!(10), 1, 1));

        let drained = agg.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].open, dec!(10));
        assert_eq!(drained[0].close, dec!(20));
    }

    #[test]
    fn drain_is_idempotent() {
        let mut agg = CandleAggregator::new([1000], 0);
        agg.ingest(&print(1000, dec!(10), 1, 1));
        let first = agg.drain();
        assert_eq!(first.len(), 1);
        let second = agg.drain();
        assert!(second.is_empty());
    }

    #[test]
    fn emitted_ts_is_strictly_increasing_per_interval() {
        let mut agg = CandleAggregator::new([1000], 0);
        let mut all = Vec::new();
        all.extend(agg.ingest(&print(1000, dec!(10), 1, 1)).emitted);
        all.extend(agg.ingest(&print(2000, dec!(11), 1, 2)).emitted);
        all.extend(agg.ingest(&print(3000, dec!(12), 1, 3)).emitted);
        all.extend(agg.drain());

        for pair in all.windows(2) {
            assert!(pair[0].ts < pair[1].ts);
        }
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn late_print_with_window_end_past_watermark_is_always_admitted_if_builder_open() {
        let mut agg = CandleAggregator::new([1000], 0);
        agg.ingest(&print(1000, dec!(10), 1, 1));
        // window_end (2000) is still > watermark (1000); always admitted.
        let outcome = agg.ingest(&print(1000, dec!(20), 5, 2));
        assert_eq!(outcome.dropped_late, 0);
        let drained = agg.drain();
        assert_eq!(drained[0].volume, 6);
    }

    #[test]
    fn normalises_intervals_positive_deduped_sorted() {
        let agg = CandleAggregator::new([5000, 1000, 1000, -1, 0, 5000], -10);
        assert_eq!(agg.intervals_ms(), &[1000, 5000]);
    }
}
