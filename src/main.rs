use std::env;
use std::time::Duration;

use livetape_rs::market_data::adapters::tape_feed::{TapeFeedAdapter, DEFAULT_WS_URL};
use livetape_rs::market_data::adapters::FeedAdapter;
use livetape_rs::market_data::router::{now_ms, TapeRouter};
use livetape_rs::tape::types::{HealthStatus, PriceDirection, TapeSnapshot};
use livetape_rs::telemetry;
use tokio::sync::mpsc;
use tracing::info;

// One-line tape summary, printed once a second by the display task
fn print_summary(snap: &TapeSnapshot) {
    let price = match snap.current_price {
        Some(p) => format!("${p:.2}"),
        None => "-".to_string(),
    };
    let arrow = match snap.direction {
        PriceDirection::Up => "+",
        PriceDirection::Down => "-",
        PriceDirection::Neutral => "=",
    };
    let health = match snap.health {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Stale => "STALE",
        HealthStatus::Connecting => "connecting",
        HealthStatus::Disconnected => "DISCONNECTED",
        HealthStatus::Errored => "ERROR",
    };
    let spread = match snap.book.spread {
        Some(s) => format!("{s:.2}"),
        None => "-".to_string(),
    };

    println!(
        "[{health}] {price} ({arrow}) | trades {} | vol {:.4} BTC (${:.0}) | avg {:.6} | tps {:.2} (peak {:.2}) | spread {spread} depth {:.3}/{:.3}",
        snap.trade_count,
        snap.total_volume,
        snap.session.volume_usd,
        snap.avg_trade_size,
        snap.trades_per_second,
        snap.highest_tps,
        snap.book.bid_depth,
        snap.book.ask_depth,
    );

    if let Some(ref largest) = snap.largest_trade {
        println!(
            "  largest: {:?} {:.6} BTC @ ${:.2}",
            largest.side, largest.size, largest.price
        );
    }
    if let Some(hit) = snap.repeated_size {
        println!(
            "  possible bot: {}x trades of {:.4} BTC @ ${:.2}",
            hit.count, hit.size, hit.last_price
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    telemetry::init_tracing("info");
    telemetry::init_metrics();

    let ws_url = env::var("TAPE_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
    let reconnect_secs: u64 = env::var("TAPE_RECONNECT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let min_trade_size: f64 = env::var("TAPE_MIN_TRADE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);

    info!(%ws_url, reconnect_secs, min_trade_size, "starting live tape");

    let (router, mut snapshots) = TapeRouter::new(min_trade_size, now_ms());
    let (tx, rx) = mpsc::channel(1024);

    let adapter =
        TapeFeedAdapter::new(ws_url).with_reconnect(Duration::from_secs(reconnect_secs));
    let feed_task = tokio::spawn(async move {
        adapter.run(tx).await;
    });

    let router_task = tokio::spawn(router.run(rx));

    // Display task: poll the latest snapshot once a second
    let display_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let snap = snapshots.borrow_and_update().clone();
            print_summary(&snap);
        }
    });

    tokio::select! {
        _ = feed_task => info!("feed task completed"),
        _ = router_task => info!("router task completed"),
        _ = display_task => info!("display task completed"),
    }

    Ok(())
}
