//! Prometheus metrics for the conversation runtime.
//!
//! The runtime records counters through the `metrics` facade; nothing is
//! exported until [`install_prometheus`] installs a recorder. The bot binary
//! calls it once at startup and serves the handle on `/metrics`.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge};

/// Actions reduced, including actions fed back by effects
pub const ACTIONS_TOTAL: &str = "conversation.actions.total";
/// Effects abandoned after exceeding the per-effect timeout
pub const EFFECTS_TIMED_OUT: &str = "conversation.effects.timed_out";
/// Turns cut short by the per-turn action limit
pub const TURNS_ABORTED: &str = "conversation.turns.aborted";
/// Conversations with an in-progress session record
pub const SESSIONS_ACTIVE: &str = "conversation.sessions.active";

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the Prometheus recorder
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and registers runtime metric descriptions.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_prometheus() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Register runtime metric descriptions.
pub fn register_metrics() {
    describe_counter!(ACTIONS_TOTAL, "Total number of actions reduced by conversations");
    describe_counter!(
        EFFECTS_TIMED_OUT,
        "Total number of effects abandoned after the effect timeout"
    );
    describe_counter!(
        TURNS_ABORTED,
        "Total number of turns stopped by the per-turn action limit"
    );
    metrics::describe_gauge!(SESSIONS_ACTIVE, "Conversations currently in progress");
}
