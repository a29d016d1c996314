pub mod market_data;
pub mod tape;
pub mod telemetry;
