//! Business metrics for the ticket desk.
//!
//! ## Counters
//! - `desk.updates.received{kind}` - inbound chat updates by kind
//! - `tickets.issued` - tickets persisted by the issuance routine
//! - `payments.approved` / `payments.rejected` - operator decisions
//!
//! ## Gauges
//! - `payments.pending` - payments waiting for a decision

use metrics::{describe_counter, describe_gauge};

/// Inbound updates, labelled by `kind`
pub const UPDATES_RECEIVED: &str = "desk.updates.received";
/// Tickets persisted
pub const TICKETS_ISSUED: &str = "tickets.issued";
/// Payments approved by the operator
pub const PAYMENTS_APPROVED: &str = "payments.approved";
/// Payments rejected by the operator
pub const PAYMENTS_REJECTED: &str = "payments.rejected";
/// Payments waiting for the operator
pub const PAYMENTS_PENDING: &str = "payments.pending";

/// Register business metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(UPDATES_RECEIVED, "Inbound chat updates by kind");
    describe_counter!(TICKETS_ISSUED, "Tickets persisted by the issuance routine");
    describe_counter!(PAYMENTS_APPROVED, "Payments confirmed by the operator");
    describe_counter!(PAYMENTS_REJECTED, "Payments refused by the operator");
    describe_gauge!(PAYMENTS_PENDING, "Payments waiting for the operator's decision");

    tracing::info!("Business metrics registered");
}
