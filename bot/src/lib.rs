//! # Boxoffice Bot
//!
//! Telegram ticket desk. Buyers pick a tier, apply a discount code and report
//! a payment; the operator confirms it and the desk issues a QR ticket. The
//! operator also has a password-protected panel for ticket checks, prices,
//! discount codes and free tickets.
//!
//! ## Layout
//!
//! - [`command`]: inbound updates decoded into typed commands and callbacks
//! - [`buyer`] / [`admin`]: conversation reducers run by
//!   [`boxoffice_runtime::ConversationStore`]
//! - [`approval`]: operator decisions on pending payments
//! - [`issuance`]: ticket persistence, activation and delivery
//! - [`dispatcher`]: routes every update to the right flow
//! - [`telegram`], [`qr`], [`server`]: adapters for the Bot API, QR codes and HTTP

pub mod admin;
pub mod approval;
pub mod buyer;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod issuance;
pub mod messages;
pub mod metrics;
pub mod pending;
pub mod qr;
pub mod server;
pub mod telegram;

pub use config::{Config, ConfigError};
pub use dispatcher::Dispatcher;

use boxoffice_core::async_effect;
use boxoffice_core::effect::Effect;
use boxoffice_core::ports::{Notifier, OutboundMessage};
use std::sync::Arc;

/// Sends one message within the turn, logging delivery failures
pub(crate) fn reply<A: Send + 'static>(notifier: &Arc<dyn Notifier>, message: OutboundMessage) -> Effect<A> {
    let notifier = Arc::clone(notifier);
    async_effect! {
        let to = message.to;
        if let Err(error) = notifier.deliver(message).await {
            tracing::error!(chat = %to, %error, "Reply delivery failed");
        }
        None
    }
}
