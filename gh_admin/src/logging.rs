//! Structured logging configuration.
//!
//! Installs a `tracing` subscriber that also receives the `log` records
//! emitted by the ledger library, and provides the observer that turns
//! committed ledger events into structured audit records.

use gamehub_ledger::ledger::{LedgerEvent, LedgerObserver};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` (default: `info,sqlx=warn`).
/// Output goes to stderr so stdout stays machine-readable.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Emits one structured `tracing` record per committed ledger event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LedgerObserver for TracingObserver {
    fn on_committed(&self, event: &LedgerEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(
                target: "gamehub_ledger::audit",
                event_kind = event.kind(),
                payload = %payload,
                "Ledger event committed"
            ),
            Err(e) => tracing::error!(
                event_kind = event.kind(),
                error = %e,
                "Failed to serialize ledger event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_observer_without_subscriber() {
        // Just ensure it doesn't panic
        TracingObserver.on_committed(&LedgerEvent::PaymentInfoUpdated {
            user_id: 1,
            payment_info_id: 2,
        });
    }
}
