use crate::tape::types::HealthStatus;

/// A nominally-connected feed with no heartbeat inside this window is stale.
pub const HEARTBEAT_STALE_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Errored,
}

/// Derived connection health: transport-reported state, overridden to
/// [`HealthStatus::Stale`] when heartbeats stop while connected.
#[derive(Debug)]
pub struct ConnectionHealth {
    state: TransportState,
    last_heartbeat_ms: Option<u64>,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self { state: TransportState::Connecting, last_heartbeat_ms: None }
    }

    pub fn on_transport(&mut self, state: TransportState) {
        self.state = state;
    }

    pub fn on_heartbeat(&mut self, now_ms: u64) {
        self.last_heartbeat_ms = Some(now_ms);
    }

    pub fn last_heartbeat_ms(&self) -> Option<u64> {
        self.last_heartbeat_ms
    }

    pub fn status(&self, now_ms: u64) -> HealthStatus {
        match self.state {
            TransportState::Connecting => HealthStatus::Connecting,
            TransportState::Disconnected => HealthStatus::Disconnected,
            TransportState::Errored => HealthStatus::Errored,
            TransportState::Connected => match self.last_heartbeat_ms {
                Some(ts) if now_ms.saturating_sub(ts) > HEARTBEAT_STALE_MS => HealthStatus::Stale,
                _ => HealthStatus::Healthy,
            },
        }
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}
