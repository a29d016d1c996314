use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

// A single executed trade as it arrives off the feed. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub side: Side,
    // ms since epoch, as stamped by the feed
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDirection {
    Up,
    Down,
    Neutral,
}

// 24h market summary, wholesale-replaced on each ticker event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ticker {
    pub price: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub volume_24h: f64,
    pub low_24h: f64,
    pub high_24h: f64,
}

impl Ticker {
    pub fn spread(&self) -> f64 {
        self.best_ask - self.best_bid
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

// One incremental change to a price level; size 0 removes the level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookChange {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

// Top-of-book view handed to subscribers: best-first, capped at the display depth
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookView {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub spread: Option<f64>,
    pub bid_depth: f64,
    pub ask_depth: f64,
}

// Result of scanning the recent tape for runs of identical trade sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatedSize {
    pub size: f64,
    pub count: usize,
    pub last_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub started_ms: u64,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume_usd: f64,
    pub invalid_trades: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Connecting,
    Healthy,
    Stale,
    Disconnected,
    Errored,
}

// Read-only copy of the full aggregate state, published once per ingested event
#[derive(Debug, Clone, PartialEq)]
pub struct TapeSnapshot {
    pub current_price: Option<f64>,
    pub direction: PriceDirection,
    pub trade_count: u64,
    pub total_volume: f64,
    pub avg_trade_size: f64,
    pub trades_per_second: f64,
    pub highest_tps: f64,
    pub largest_trade: Option<Trade>,
    pub recent_trades: Vec<Trade>,
    pub size_buckets: [u64; 6],
    pub repeated_size: Option<RepeatedSize>,
    pub session: SessionStats,
    pub ticker: Option<Ticker>,
    pub book: BookView,
    pub health: HealthStatus,
    pub last_heartbeat_ms: Option<u64>,
}
