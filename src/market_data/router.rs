// Router owns the aggregation state and is its single writer: events arrive
// over one mpsc channel, state snapshots leave over a watch channel. No locks
// anywhere on the ingest path.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::market_data::adapters::FeedEvent;
use crate::tape::aggregator::{TapeAggregator, REPEAT_SCAN};
use crate::tape::book::BookSummary;
use crate::tape::health::ConnectionHealth;
use crate::tape::types::TapeSnapshot;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct TapeRouter {
    aggregator: TapeAggregator,
    book: BookSummary,
    health: ConnectionHealth,
    snapshot_tx: watch::Sender<TapeSnapshot>,
}

impl TapeRouter {
    /// Build a router plus the receiver subscribers watch for fresh state.
    pub fn new(min_trade_size: f64, started_ms: u64) -> (Self, watch::Receiver<TapeSnapshot>) {
        let mut aggregator = TapeAggregator::new(started_ms);
        aggregator.min_trade_size = min_trade_size;
        let book = BookSummary::new();
        let health = ConnectionHealth::new();

        let initial = build_snapshot(&aggregator, &book, &health, started_ms);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let router = Self { aggregator, book, health, snapshot_tx };
        (router, snapshot_rx)
    }

    /// Dispatch one event, then publish the resulting state. Synchronous:
    /// everything the event touches happens before the snapshot goes out.
    pub fn handle_event(&mut self, event: FeedEvent, now_ms: u64) {
        match event {
            FeedEvent::Trade(trade) => {
                if self.aggregator.on_trade(trade, now_ms) {
                    metrics::counter!("livetape_trades_total").increment(1);
                    metrics::gauge!("livetape_tps").set(self.aggregator.trades_per_second);
                } else {
                    metrics::counter!("livetape_rejected_trades_total").increment(1);
                }
            }
            FeedEvent::Ticker(ticker) => self.aggregator.on_ticker(ticker),
            FeedEvent::BookSnapshot { bids, asks } => self.book.apply_snapshot(&bids, &asks),
            FeedEvent::BookUpdate { changes } => self.book.apply_update(&changes),
            FeedEvent::Heartbeat => self.health.on_heartbeat(now_ms),
            FeedEvent::Status { message } => info!(%message, "feed status"),
            FeedEvent::Subscriptions { channels } => {
                debug!(?channels, "channel filter acknowledged")
            }
            FeedEvent::Transport(state) => self.health.on_transport(state),
        }

        let snapshot = build_snapshot(&self.aggregator, &self.book, &self.health, now_ms);
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Drain the feed channel until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<FeedEvent>) {
        info!("tape router started");
        while let Some(event) = rx.recv().await {
            self.handle_event(event, now_ms());
        }
        info!("feed channel closed, router stopping");
    }
}

fn build_snapshot(
    aggregator: &TapeAggregator,
    book: &BookSummary,
    health: &ConnectionHealth,
    now_ms: u64,
) -> TapeSnapshot {
    TapeSnapshot {
        current_price: aggregator.current_price,
        direction: aggregator.direction,
        trade_count: aggregator.trade_count,
        total_volume: aggregator.total_volume,
        avg_trade_size: aggregator.avg_trade_size,
        trades_per_second: aggregator.trades_per_second,
        highest_tps: aggregator.highest_tps,
        largest_trade: aggregator.largest.clone(),
        recent_trades: aggregator.recent.iter().cloned().collect(),
        size_buckets: aggregator.size_buckets(),
        repeated_size: aggregator.repeated_size(REPEAT_SCAN),
        session: aggregator.session,
        ticker: aggregator.ticker.clone(),
        book: book.view().clone(),
        health: health.status(now_ms),
        last_heartbeat_ms: health.last_heartbeat_ms(),
    }
}
