// Market data module entrypoint
pub mod adapters; // feed-specific websocket clients
pub mod router;   // single-writer event dispatch + snapshot publishing
