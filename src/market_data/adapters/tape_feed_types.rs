// Wire format of the local tape bridge: {"type": ..., "data": ...} envelopes
// carrying trade / ticker / order-book / heartbeat / status payloads.

use serde::Deserialize;

use crate::tape::types::Side;

#[derive(Debug, Deserialize)]
pub struct WsEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// Order-book sides come as [price, size] pairs, best-first
#[derive(Debug, Deserialize)]
pub struct WsBookSnapshot {
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

// Incremental changes come as [side, price, size] triples; size 0 deletes
#[derive(Debug, Deserialize)]
pub struct WsBookUpdate {
    pub changes: Vec<(Side, f64, f64)>,
}

#[derive(Debug, Deserialize)]
pub struct WsStatus {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WsSubscriptions {
    #[serde(default)]
    pub channels: Vec<String>,
}
