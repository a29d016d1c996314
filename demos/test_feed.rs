// Simple connectivity check against the local tape bridge
// Run with: cargo run --example test_feed

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[tokio::main]
async fn main() {
    let url =
        std::env::var("TAPE_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000/ws".to_string());
    println!("Testing tape bridge connectivity...");
    println!("Connecting to: {url}");

    match connect_async(&url).await {
        Ok((ws_stream, response)) => {
            println!("Connected, status: {}", response.status());

            let (mut write, mut read) = ws_stream.split();

            let subscribe = serde_json::json!({
                "type": "subscribe",
                "channels": ["trades", "ticker", "orderbook", "heartbeat"],
            });
            println!("Sending channel filter: {subscribe}");
            if let Err(e) = write.send(Message::Text(subscribe.to_string())).await {
                eprintln!("Failed to send filter: {e}");
                return;
            }

            let timeout = tokio::time::Duration::from_secs(5);
            match tokio::time::timeout(timeout, read.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    println!("Received: {text}");
                }
                Ok(Some(Ok(other))) => {
                    println!("Received non-text message: {other:?}");
                }
                Ok(Some(Err(e))) => {
                    eprintln!("Error reading message: {e}");
                }
                Ok(None) => {
                    println!("No message received (connection closed)");
                }
                Err(_) => {
                    println!("Timeout waiting for a message");
                }
            }
        }
        Err(e) => {
            eprintln!("Failed to connect: {e}");
            eprintln!("Is the tape bridge running on {url}?");
        }
    }
}
