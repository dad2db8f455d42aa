use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

/// One named measurement emitted by the runner, tagged with the runner's
/// registration name (the `handler` dimension).
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub measurement: u64,
    pub handler: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Best-effort fan-out of runner telemetry.
///
/// The dispatcher records measurements as it works; whoever is subscribed at
/// that moment sees them. Slow or absent subscribers lose events rather than
/// slowing the dispatcher down.
#[derive(Debug, Clone)]
pub struct RunnerTelemetry {
    handler: Arc<str>,
    channel: broadcast::Sender<TelemetryEvent>,
}

impl RunnerTelemetry {
    pub fn new(handler: &str, capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity);
        Self {
            handler: Arc::from(handler),
            channel,
        }
    }

    /// Record a measurement under `name`.
    pub fn record(&self, name: &'static str, measurement: u64) {
        let event = TelemetryEvent {
            name,
            measurement,
            handler: self.handler.to_string(),
            recorded_at: chrono::Utc::now(),
        };
        // Nobody subscribed is the common case and not an error.
        let _ = self.channel.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.channel.subscribe()
    }
}
