use std::collections::BTreeMap;

use ordered_float::NotNan;
use tracing::{debug, trace};

use crate::tape::types::{BookChange, BookLevel, BookView, Side};

/// Levels per side exposed to subscribers and counted in depth stats.
pub const BOOK_DEPTH: usize = 10;

/// Top-of-book summary fed by snapshot and incremental update events.
///
/// Sides are price-keyed maps (highest bid = best, lowest ask = best) holding
/// whatever depth the feed provides; the published view and the depth/spread
/// stats are truncated to the top [`BOOK_DEPTH`] levels. Updates patch single
/// price levels in place, a size of zero deletes the level.
#[derive(Debug, Default)]
pub struct BookSummary {
    bids: BTreeMap<NotNan<f64>, f64>,
    asks: BTreeMap<NotNan<f64>, f64>,
    view: BookView,
}

impl BookSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both sides wholesale, then refresh the view and stats.
    pub fn apply_snapshot(&mut self, bids: &[BookLevel], asks: &[BookLevel]) {
        self.bids.clear();
        self.asks.clear();
        for lvl in bids {
            if let Some(price) = usable_price(lvl.price, lvl.size) {
                self.bids.insert(price, lvl.size);
            }
        }
        for lvl in asks {
            if let Some(price) = usable_price(lvl.price, lvl.size) {
                self.asks.insert(price, lvl.size);
            }
        }
        debug!(bids = self.bids.len(), asks = self.asks.len(), "applied book snapshot");
        self.refresh();
    }

    /// Patch individual price levels. An empty change set is a pure stat
    /// recomputation and leaves the book as it was.
    pub fn apply_update(&mut self, changes: &[BookChange]) {
        for change in changes {
            let side = match change.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let Ok(price) = NotNan::new(change.price) else {
                continue;
            };
            if change.size <= 0.0 {
                side.remove(&price);
            } else if change.size.is_finite() {
                side.insert(price, change.size);
            }
        }
        trace!(changes = changes.len(), "applied book update");
        self.refresh();
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids
            .iter()
            .next_back()
            .map(|(p, s)| BookLevel { price: p.into_inner(), size: *s })
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks
            .iter()
            .next()
            .map(|(p, s)| BookLevel { price: p.into_inner(), size: *s })
    }

    pub fn view(&self) -> &BookView {
        &self.view
    }

    // Rebuild the top-N view, then the stats over it. When either side is
    // empty the spread/depth figures keep their previous values.
    fn refresh(&mut self) {
        self.view.bids = self
            .bids
            .iter()
            .rev()
            .take(BOOK_DEPTH)
            .map(|(p, s)| BookLevel { price: p.into_inner(), size: *s })
            .collect();
        self.view.asks = self
            .asks
            .iter()
            .take(BOOK_DEPTH)
            .map(|(p, s)| BookLevel { price: p.into_inner(), size: *s })
            .collect();

        if self.view.bids.is_empty() || self.view.asks.is_empty() {
            trace!("one-sided book, keeping previous stats");
            return;
        }
        self.view.spread = Some(self.view.asks[0].price - self.view.bids[0].price);
        self.view.bid_depth = self.view.bids.iter().map(|l| l.size).sum();
        self.view.ask_depth = self.view.asks.iter().map(|l| l.size).sum();
    }
}

fn usable_price(price: f64, size: f64) -> Option<NotNan<f64>> {
    if price > 0.0 && size > 0.0 && size.is_finite() {
        NotNan::new(price).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(price: f64, size: f64) -> BookLevel {
        BookLevel { price, size }
    }

    // 12 bid levels descending from 99.0, 12 ask levels ascending from 101.0
    fn deep_sides() -> (Vec<BookLevel>, Vec<BookLevel>) {
        let bids = (0..12).map(|i| lvl(99.0 - i as f64, 1.0 + i as f64)).collect();
        let asks = (0..12).map(|i| lvl(101.0 + i as f64, 2.0 + i as f64)).collect();
        (bids, asks)
    }

    #[test]
    fn snapshot_view_truncates_to_depth() {
        let mut book = BookSummary::new();
        let (bids, asks) = deep_sides();
        book.apply_snapshot(&bids, &asks);

        let view = book.view();
        assert_eq!(view.bids.len(), 10);
        assert_eq!(view.asks.len(), 10);
        assert_eq!(view.bids[0].price, 99.0);
        assert_eq!(view.asks[0].price, 101.0);
        assert_eq!(view.spread, Some(2.0));
        // sums over the retained 10 levels only: 1+2+..+10 and 2+3+..+11
        assert!((view.bid_depth - 55.0).abs() < 1e-12);
        assert!((view.ask_depth - 65.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_replaces_wholesale() {
        let mut book = BookSummary::new();
        let (bids, asks) = deep_sides();
        book.apply_snapshot(&bids, &asks);
        book.apply_snapshot(&[lvl(50.0, 1.0)], &[lvl(51.0, 1.0)]);

        let view = book.view();
        assert_eq!(view.bids.len(), 1);
        assert_eq!(view.asks.len(), 1);
        assert_eq!(view.spread, Some(1.0));
        assert_eq!(view.bid_depth, 1.0);
    }

    #[test]
    fn empty_update_recomputes_idempotently() {
        let mut book = BookSummary::new();
        let (bids, asks) = deep_sides();
        book.apply_snapshot(&bids, &asks);
        let before = book.view().clone();

        book.apply_update(&[]);
        assert_eq!(book.view(), &before);
    }

    #[test]
    fn update_patches_levels() {
        let mut book = BookSummary::new();
        book.apply_snapshot(&[lvl(99.0, 1.0), lvl(98.0, 2.0)], &[lvl(101.0, 1.0), lvl(102.0, 2.0)]);

        book.apply_update(&[
            // resize an existing bid level
            BookChange { side: Side::Buy, price: 98.0, size: 5.0 },
            // new best bid
            BookChange { side: Side::Buy, price: 99.5, size: 1.5 },
            // delete the best ask
            BookChange { side: Side::Sell, price: 101.0, size: 0.0 },
        ]);

        let view = book.view();
        assert_eq!(view.bids[0], lvl(99.5, 1.5));
        assert_eq!(view.bids[2], lvl(98.0, 5.0));
        assert_eq!(view.asks[0], lvl(102.0, 2.0));
        assert_eq!(view.spread, Some(2.5));
        assert!((view.bid_depth - 7.5).abs() < 1e-12);
        assert_eq!(view.ask_depth, 2.0);
    }

    #[test]
    fn update_past_depth_resurfaces_on_deletes() {
        let mut book = BookSummary::new();
        let (bids, asks) = deep_sides();
        book.apply_snapshot(&bids, &asks);
        // the 11th bid level (89.0) is outside the view until a better level goes away
        assert!(!book.view().bids.iter().any(|l| l.price == 89.0));

        book.apply_update(&[BookChange { side: Side::Buy, price: 99.0, size: 0.0 }]);
        let view = book.view();
        assert_eq!(view.bids.len(), 10);
        assert_eq!(view.bids[0].price, 98.0);
        assert!(view.bids.iter().any(|l| l.price == 89.0));
    }

    #[test]
    fn one_sided_book_retains_stats() {
        let mut book = BookSummary::new();
        book.apply_snapshot(&[lvl(99.0, 1.0)], &[lvl(101.0, 2.0)]);
        assert_eq!(book.view().spread, Some(2.0));

        // asks wiped: lists update, stats hold their previous values
        book.apply_update(&[BookChange { side: Side::Sell, price: 101.0, size: 0.0 }]);
        let view = book.view();
        assert!(view.asks.is_empty());
        assert_eq!(view.spread, Some(2.0));
        assert_eq!(view.bid_depth, 1.0);
        assert_eq!(view.ask_depth, 2.0);
    }

    #[test]
    fn unusable_levels_are_skipped() {
        let mut book = BookSummary::new();
        book.apply_snapshot(
            &[lvl(f64::NAN, 1.0), lvl(99.0, 1.0), lvl(-1.0, 2.0), lvl(98.0, 0.0)],
            &[lvl(101.0, 1.0)],
        );
        assert_eq!(book.view().bids.len(), 1);
        assert_eq!(book.best_bid().unwrap().price, 99.0);
    }
}
