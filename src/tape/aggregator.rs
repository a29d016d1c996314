use std::collections::VecDeque;

use tracing::{debug, instrument, trace};

use crate::tape::types::{PriceDirection, RepeatedSize, SessionStats, Ticker, Trade};

/// Most recent trades retained for display, newest first.
pub const RECENT_TRADES_CAP: usize = 100;
/// Rolling window for the trades-per-second figure.
pub const TPS_WINDOW_SECS: u64 = 10;
const TPS_WINDOW_MS: u64 = TPS_WINDOW_SECS * 1000;
/// A ticker price within this distance of the live trade price does not
/// overwrite it, so the display does not flicker between the two feeds.
pub const TICKER_PRICE_TOLERANCE: f64 = 0.01;
// Size-bucket boundaries for the trade-size distribution
const BUCKET_BOUNDS: [f64; 5] = [0.0001, 0.001, 0.01, 0.1, 1.0];
// Identical rounded sizes needed before the tape is flagged as repetitive
const REPEAT_THRESHOLD: usize = 5;
/// How far back the repeated-size scan looks by default.
pub const REPEAT_SCAN: usize = 10;

/// Bounded-memory rolling statistics over the live trade tape.
///
/// Owned by a single writer (the router task); every mutation happens on the
/// ingest path, so no locking is involved. All buffers are capped: the recent
/// tape at [`RECENT_TRADES_CAP`] entries, the timestamp window at whatever
/// arrives inside [`TPS_WINDOW_SECS`].
#[derive(Debug)]
pub struct TapeAggregator {
    pub min_trade_size: f64,
    pub current_price: Option<f64>,
    pub direction: PriceDirection,
    pub recent: VecDeque<Trade>,
    pub trade_count: u64,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub trades_per_second: f64,
    pub highest_tps: f64,
    pub largest: Option<Trade>,
    pub ticker: Option<Ticker>,
    pub session: SessionStats,
    // arrival timestamps (ms), newest first
    window: VecDeque<u64>,
}

impl TapeAggregator {
    pub fn new(started_ms: u64) -> Self {
        Self {
            min_trade_size: 0.0,
            current_price: None,
            direction: PriceDirection::Neutral,
            recent: VecDeque::with_capacity(RECENT_TRADES_CAP),
            trade_count: 0,
            total_volume: 0.0,
            avg_trade_size: 0.0,
            trades_per_second: 0.0,
            highest_tps: 0.0,
            largest: None,
            ticker: None,
            session: SessionStats {
                started_ms,
                high: None,
                low: None,
                volume_usd: 0.0,
                invalid_trades: 0,
            },
            window: VecDeque::new(),
        }
    }

    /// Ingest one trade. `now_ms` is the arrival time on this machine, which
    /// drives the rolling TPS window; the trade's own timestamp is display
    /// data only. Returns whether the trade was accepted into the stats.
    #[instrument(level = "trace", skip(self, trade), fields(price = trade.price, size = trade.size))]
    pub fn on_trade(&mut self, trade: Trade, now_ms: u64) -> bool {
        if !trade.price.is_finite()
            || !trade.size.is_finite()
            || trade.price <= 0.0
            || trade.size <= 0.0
        {
            self.session.invalid_trades += 1;
            debug!(price = trade.price, size = trade.size, "rejecting malformed trade");
            return false;
        }
        if trade.size < self.min_trade_size {
            trace!(size = trade.size, min = self.min_trade_size, "trade below size filter");
            return false;
        }

        // Direction against the previous current price; the first trade has
        // nothing to compare to and exact equality stays neutral.
        self.direction = match self.current_price {
            None => PriceDirection::Neutral,
            Some(prev) if trade.price > prev => PriceDirection::Up,
            Some(prev) if trade.price < prev => PriceDirection::Down,
            Some(_) => PriceDirection::Neutral,
        };

        self.recent.push_front(trade.clone());
        self.recent.truncate(RECENT_TRADES_CAP);

        self.trade_count += 1;
        self.total_volume += trade.size;
        self.avg_trade_size = self.total_volume / self.trade_count as f64;

        self.window.push_front(now_ms);
        while let Some(&oldest) = self.window.back() {
            // entries exactly at the window edge are retained
            if now_ms.saturating_sub(oldest) > TPS_WINDOW_MS {
                self.window.pop_back();
            } else {
                break;
            }
        }
        self.trades_per_second = self.window.len() as f64 / TPS_WINDOW_SECS as f64;
        if self.trades_per_second > self.highest_tps {
            self.highest_tps = self.trades_per_second;
        }

        // Strictly-greater replacement: the first trade of a given size wins
        // ties, and the stored trade is a value copy.
        let replace = match &self.largest {
            Some(held) => trade.size > held.size,
            None => true,
        };
        if replace {
            self.largest = Some(trade.clone());
        }

        self.session.high = Some(self.session.high.map_or(trade.price, |h| h.max(trade.price)));
        self.session.low = Some(self.session.low.map_or(trade.price, |l| l.min(trade.price)));
        self.session.volume_usd += trade.size * trade.price;

        self.current_price = Some(trade.price);
        trace!(count = self.trade_count, tps = self.trades_per_second, "trade ingested");
        true
    }

    /// Wholesale ticker replacement. The ticker only moves the current price
    /// when it is unset or diverges from the live trade price by more than
    /// [`TICKER_PRICE_TOLERANCE`].
    pub fn on_ticker(&mut self, ticker: Ticker) {
        if !ticker.price.is_finite() || ticker.price <= 0.0 {
            debug!(price = ticker.price, "ignoring ticker with unusable price");
            return;
        }
        match self.current_price {
            None => self.current_price = Some(ticker.price),
            Some(px) if (px - ticker.price).abs() > TICKER_PRICE_TOLERANCE => {
                self.current_price = Some(ticker.price);
            }
            Some(_) => {}
        }
        self.ticker = Some(ticker);
    }

    /// Distribution of recent-buffer trades across six fixed size buckets.
    pub fn size_buckets(&self) -> [u64; 6] {
        let mut buckets = [0u64; 6];
        for t in &self.recent {
            let idx = BUCKET_BOUNDS.iter().position(|&b| t.size < b).unwrap_or(5);
            buckets[idx] += 1;
        }
        buckets
    }

    /// Scan the newest `scan` buffered trades for runs of identical sizes
    /// (rounded to 4 decimal places). A size repeating [`REPEAT_THRESHOLD`]
    /// or more times usually means an automated participant is working the
    /// tape.
    pub fn repeated_size(&self, scan: usize) -> Option<RepeatedSize> {
        let mut counts: Vec<(i64, usize, f64, f64)> = Vec::new(); // (key, count, size, newest price)
        for t in self.recent.iter().take(scan) {
            let key = (t.size * 10_000.0).round() as i64;
            match counts.iter_mut().find(|(k, ..)| *k == key) {
                Some(entry) => entry.1 += 1,
                // iterating newest-first, so the first sighting carries the latest price
                None => counts.push((key, 1, t.size, t.price)),
            }
        }
        counts
            .into_iter()
            .filter(|&(_, count, ..)| count >= REPEAT_THRESHOLD)
            .max_by_key(|&(_, count, ..)| count)
            .map(|(_, count, size, last_price)| RepeatedSize { size, count, last_price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::types::Side;
    use proptest::prelude::*;

    fn trade(price: f64, size: f64) -> Trade {
        Trade { price, size, side: Side::Buy, timestamp_ms: 0 }
    }

    #[test]
    fn totals_track_every_accepted_trade() {
        let mut agg = TapeAggregator::new(0);
        let sizes = [0.5, 1.25, 0.125, 3.0];
        for (i, &s) in sizes.iter().enumerate() {
            agg.on_trade(trade(100.0 + i as f64, s), i as u64 * 100);
        }
        assert_eq!(agg.trade_count, 4);
        let total: f64 = sizes.iter().sum();
        assert!((agg.total_volume - total).abs() < 1e-12);
        assert!((agg.avg_trade_size - total / 4.0).abs() < 1e-12);
    }

    #[test]
    fn recent_buffer_is_capped_and_newest_first() {
        let mut agg = TapeAggregator::new(0);
        for i in 0..150u64 {
            agg.on_trade(trade(100.0 + i as f64, 1.0), i);
        }
        assert_eq!(agg.recent.len(), RECENT_TRADES_CAP);
        // newest at the front, oldest surviving entry at the back
        assert_eq!(agg.recent.front().unwrap().price, 249.0);
        assert_eq!(agg.recent.back().unwrap().price, 150.0);
    }

    #[test]
    fn largest_trade_first_occurrence_wins_ties() {
        let mut agg = TapeAggregator::new(0);
        agg.on_trade(trade(100.0, 2.0), 0);
        agg.on_trade(trade(200.0, 2.0), 1);
        let held = agg.largest.as_ref().unwrap();
        assert_eq!(held.price, 100.0);

        agg.on_trade(trade(300.0, 2.5), 2);
        assert_eq!(agg.largest.as_ref().unwrap().price, 300.0);
    }

    #[test]
    fn largest_trade_is_a_value_copy() {
        let mut agg = TapeAggregator::new(0);
        let mut t = trade(100.0, 5.0);
        agg.on_trade(t.clone(), 0);
        t.price = 1.0;
        assert_eq!(agg.largest.as_ref().unwrap().price, 100.0);
    }

    #[test]
    fn tps_window_evicts_past_boundary_only() {
        let mut agg = TapeAggregator::new(0);
        agg.on_trade(trade(100.0, 1.0), 0);
        agg.on_trade(trade(100.0, 1.0), 1_000);
        agg.on_trade(trade(100.0, 1.0), 2_000);
        assert!((agg.trades_per_second - 0.3).abs() < 1e-12);

        // at t=12s the entries at 0 and 1s fall out; 2s is exactly on the
        // boundary and stays
        agg.on_trade(trade(100.0, 1.0), 12_000);
        assert!((agg.trades_per_second - 0.2).abs() < 1e-12);
    }

    #[test]
    fn highest_tps_is_a_watermark() {
        let mut agg = TapeAggregator::new(0);
        for i in 0..5 {
            agg.on_trade(trade(100.0, 1.0), i * 10);
        }
        assert!((agg.highest_tps - 0.5).abs() < 1e-12);
        // window drains; the watermark stays
        agg.on_trade(trade(100.0, 1.0), 60_000);
        assert!((agg.trades_per_second - 0.1).abs() < 1e-12);
        assert!((agg.highest_tps - 0.5).abs() < 1e-12);
    }

    #[test]
    fn direction_sequence_matches_price_path() {
        let mut agg = TapeAggregator::new(0);
        let mut seen = Vec::new();
        for &p in &[100.0, 105.0, 105.0, 95.0] {
            agg.on_trade(trade(p, 1.0), 0);
            seen.push(agg.direction);
        }
        assert_eq!(
            seen,
            vec![
                PriceDirection::Neutral,
                PriceDirection::Up,
                PriceDirection::Neutral,
                PriceDirection::Down,
            ]
        );
    }

    #[test]
    fn ticker_respects_price_tolerance() {
        let mut agg = TapeAggregator::new(0);
        let ticker = |price: f64| Ticker {
            price,
            best_bid: price - 0.5,
            best_ask: price + 0.5,
            volume_24h: 1000.0,
            low_24h: price - 50.0,
            high_24h: price + 50.0,
        };

        // unset price: ticker seeds it
        agg.on_ticker(ticker(100.0));
        assert_eq!(agg.current_price, Some(100.0));

        agg.on_trade(trade(100.0, 1.0), 0);

        // within tolerance of the live trade price: no overwrite
        agg.on_ticker(ticker(100.005));
        assert_eq!(agg.current_price, Some(100.0));

        // diverged past tolerance: ticker wins
        agg.on_ticker(ticker(100.02));
        assert_eq!(agg.current_price, Some(100.02));

        // the snapshot itself is always replaced
        assert_eq!(agg.ticker.as_ref().unwrap().price, 100.02);
        assert!((agg.ticker.as_ref().unwrap().spread() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_trades_counted_not_aggregated() {
        let mut agg = TapeAggregator::new(0);
        assert!(!agg.on_trade(trade(f64::NAN, 1.0), 0));
        assert!(!agg.on_trade(trade(100.0, 0.0), 0));
        assert!(!agg.on_trade(trade(-5.0, 1.0), 0));
        assert_eq!(agg.session.invalid_trades, 3);
        assert_eq!(agg.trade_count, 0);
        assert!(agg.recent.is_empty());
    }

    #[test]
    fn size_filter_drops_silently() {
        let mut agg = TapeAggregator::new(0);
        agg.min_trade_size = 0.01;
        assert!(!agg.on_trade(trade(100.0, 0.005), 0));
        assert!(agg.on_trade(trade(100.0, 0.01), 0));
        assert_eq!(agg.trade_count, 1);
        assert_eq!(agg.session.invalid_trades, 0);
    }

    #[test]
    fn session_stats_accumulate() {
        let mut agg = TapeAggregator::new(7);
        agg.on_trade(trade(100.0, 2.0), 0);
        agg.on_trade(trade(90.0, 1.0), 1);
        agg.on_trade(trade(110.0, 0.5), 2);
        assert_eq!(agg.session.started_ms, 7);
        assert_eq!(agg.session.high, Some(110.0));
        assert_eq!(agg.session.low, Some(90.0));
        assert!((agg.session.volume_usd - (200.0 + 90.0 + 55.0)).abs() < 1e-9);
    }

    #[test]
    fn size_buckets_partition_recent_trades() {
        let mut agg = TapeAggregator::new(0);
        for &s in &[0.00005, 0.0005, 0.005, 0.05, 0.5, 5.0, 5.0] {
            agg.on_trade(trade(100.0, s), 0);
        }
        assert_eq!(agg.size_buckets(), [1, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn repeated_size_detected_at_threshold() {
        let mut agg = TapeAggregator::new(0);
        for i in 0..5u64 {
            agg.on_trade(trade(100.0 + i as f64, 0.25), i);
        }
        let hit = agg.repeated_size(10).unwrap();
        assert_eq!(hit.count, 5);
        assert!((hit.size - 0.25).abs() < 1e-12);
        // newest price for that size
        assert_eq!(hit.last_price, 104.0);

        let mut quiet = TapeAggregator::new(0);
        for i in 0..4u64 {
            quiet.on_trade(trade(100.0, 0.25), i);
        }
        assert!(quiet.repeated_size(10).is_none());
    }

    #[test]
    fn repeated_size_scan_is_bounded() {
        let mut agg = TapeAggregator::new(0);
        // five matching sizes, but only two inside the scanned tail
        for i in 0..5u64 {
            agg.on_trade(trade(100.0, 0.25), i);
        }
        for i in 0..8u64 {
            agg.on_trade(trade(100.0, 1.0 + i as f64), 10 + i);
        }
        assert!(agg.repeated_size(10).is_none());
    }

    proptest! {
        #[test]
        fn totals_invariant_for_any_sequence(
            sizes in proptest::collection::vec(0.0001f64..10.0, 1..200)
        ) {
            let mut agg = TapeAggregator::new(0);
            for (i, &s) in sizes.iter().enumerate() {
                agg.on_trade(trade(50_000.0, s), i as u64);
            }
            let total: f64 = sizes.iter().sum();
            prop_assert_eq!(agg.trade_count, sizes.len() as u64);
            prop_assert!((agg.total_volume - total).abs() < 1e-9);
            prop_assert!((agg.avg_trade_size - total / sizes.len() as f64).abs() < 1e-9);
            prop_assert!(agg.recent.len() <= RECENT_TRADES_CAP);
        }
    }
}
