//! Fire-and-forget analytics events

use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A streamed answer ran to the end of the body
    AnswerComplete {
        chat_id: Option<String>,
        answer_len: usize,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::AnswerComplete { .. } => "answer-complete",
        }
    }
}

/// Receives telemetry events; must not block or fail the caller
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Writes events to the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::AnswerComplete {
                chat_id,
                answer_len,
            } => info!(
                event = event.name(),
                chat_id = chat_id.as_deref().unwrap_or(""),
                answer_len,
                "telemetry"
            ),
        }
    }
}
