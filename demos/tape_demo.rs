// Standalone demo: connect to the local tape bridge and print every state
// change as it is published.
// Run with: cargo run --example tape_demo

use livetape_rs::market_data::adapters::tape_feed::{TapeFeedAdapter, DEFAULT_WS_URL};
use livetape_rs::market_data::adapters::FeedAdapter;
use livetape_rs::market_data::router::{now_ms, TapeRouter};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    println!("Live tape demo");
    println!("==============");
    println!("This demo will:");
    println!("1. Connect to the tape bridge at {DEFAULT_WS_URL}");
    println!("2. Request the trade/ticker/orderbook/heartbeat channels");
    println!("3. Print the aggregate tape state after every event");
    println!();
    println!("Press Ctrl+C to stop the demo");
    println!();

    let (router, mut snapshots) = TapeRouter::new(0.0, now_ms());
    let (tx, rx) = mpsc::channel(1024);

    let adapter = TapeFeedAdapter::new(DEFAULT_WS_URL);
    tokio::spawn(async move {
        adapter.run(tx).await;
    });
    tokio::spawn(router.run(rx));

    // the push interface: wake up only when new state lands
    while snapshots.changed().await.is_ok() {
        let snap = snapshots.borrow_and_update().clone();
        println!(
            "price {:?} | trades {} | tps {:.2} | book {}x{} | health {:?}",
            snap.current_price,
            snap.trade_count,
            snap.trades_per_second,
            snap.book.bids.len(),
            snap.book.asks.len(),
            snap.health,
        );
    }
}
