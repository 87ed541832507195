//! Routes decoded updates to the conversation that owns them.

use crate::admin::{AdminAction, AdminEnvironment, AdminReducer};
use crate::approval::{ApprovalHandler, Decision};
use crate::buyer::{BuyerAction, BuyerEnvironment, BuyerReducer, BuyerSession};
use crate::command::{Callback, Inbound, SlashCommand};
use crate::issuance::Issuer;
use crate::pending::PendingTransactions;
use crate::{messages, metrics};
use boxoffice_core::ports::{IdGenerator, Notifier, OutboundMessage, QrCodec, RecordStore};
use boxoffice_core::types::{ChatId, ReferenceToken};
use boxoffice_runtime::{ConversationStore, RuntimeConfig, StoreError};
use std::sync::Arc;

/// External collaborators of the desk
#[derive(Clone)]
pub struct Collaborators {
    /// Products, codes and tickets
    pub records: Arc<dyn RecordStore>,
    /// Outbound messages
    pub notifier: Arc<dyn Notifier>,
    /// QR rendering
    pub qr: Arc<dyn QrCodec>,
    /// Ticket ids and reference tokens
    pub ids: Arc<dyn IdGenerator>,
}

/// Deployment settings of the desk
#[derive(Debug, Clone)]
pub struct DeskSettings {
    /// Operator chat
    pub operator: ChatId,
    /// Panel password
    pub password: String,
    /// Shown on the payment screen
    pub payment_link: String,
    /// Conversation runtime tuning
    pub runtime: RuntimeConfig,
}

/// Entry point for every inbound update.
///
/// Owns one conversation store per flow plus the pending payment table.
pub struct Dispatcher {
    buyers: ConversationStore<BuyerReducer>,
    admins: ConversationStore<AdminReducer>,
    approvals: ApprovalHandler,
    notifier: Arc<dyn Notifier>,
    pending: PendingTransactions,
    operator: ChatId,
}

impl Dispatcher {
    /// Wires both flows and the approval handler around shared collaborators
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: DeskSettings) -> Self {
        let Collaborators {
            records,
            notifier,
            qr,
            ids,
        } = collaborators;
        let pending = PendingTransactions::new();
        let issuer = Issuer::new(
            Arc::clone(&records),
            Arc::clone(&notifier),
            Arc::clone(&qr),
            Arc::clone(&ids),
            settings.operator,
        );

        let buyers = ConversationStore::with_config(
            BuyerReducer,
            BuyerEnvironment {
                records: Arc::clone(&records),
                notifier: Arc::clone(&notifier),
                ids,
                pending: pending.clone(),
                operator: settings.operator,
                payment_link: settings.payment_link,
            },
            settings.runtime,
        );
        let admins = ConversationStore::with_config(
            AdminReducer,
            AdminEnvironment {
                records,
                notifier: Arc::clone(&notifier),
                qr,
                issuer: issuer.clone(),
                operator: settings.operator,
                password: settings.password,
            },
            settings.runtime,
        );
        let approvals = ApprovalHandler::new(pending.clone(), issuer, Arc::clone(&notifier), settings.operator);

        Self {
            buyers,
            admins,
            approvals,
            notifier,
            pending,
            operator: settings.operator,
        }
    }

    /// Payments waiting for the operator
    #[must_use]
    pub const fn pending(&self) -> &PendingTransactions {
        &self.pending
    }

    /// Current purchase step of `chat`, `None` when no purchase is in progress
    pub async fn buyer_step(&self, chat: ChatId) -> Option<&'static str> {
        self.buyers.state(chat, |session| session.step()).await
    }

    /// Current panel step of `chat`, `None` when not in the panel
    pub async fn admin_step(&self, chat: ChatId) -> Option<&'static str> {
        self.admins.state(chat, |session| session.step()).await
    }

    /// Handles one update from `from`.
    ///
    /// Never fails: problems are reported to the sender or logged.
    pub async fn dispatch(&self, from: ChatId, first_name: &str, inbound: Inbound) {
        let kind = inbound.kind();
        tracing::info!(chat = %from, kind, "Update received");
        ::metrics::counter!(metrics::UPDATES_RECEIVED, "kind" => kind).increment(1);

        let outcome = match inbound {
            Inbound::Command(SlashCommand::Start) => {
                self.send(messages::welcome(from, first_name, from == self.operator)).await;
                Ok(())
            },
            Inbound::Command(SlashCommand::Buy) => self.buyers.send(from, BuyerAction::Start { chat: from }).await,
            Inbound::Command(SlashCommand::Admin) => self.admins.send(from, AdminAction::Enter { chat: from }).await,
            Inbound::Command(SlashCommand::Cancel) => self.cancel(from).await,

            Inbound::Callback(Callback::Approve(token)) => {
                self.decide(from, token, Decision::Approve).await;
                Ok(())
            },
            Inbound::Callback(Callback::Reject(token)) => {
                self.decide(from, token, Decision::Reject).await;
                Ok(())
            },
            Inbound::Callback(Callback::Buyer(button)) => {
                self.buyers.send(from, BuyerAction::Pressed { chat: from, button }).await
            },
            Inbound::Callback(Callback::Admin(button)) => {
                if from != self.operator {
                    self.send(messages::access_denied(from)).await;
                    Ok(())
                } else if self.admins.is_active(from) {
                    self.admins.send(from, AdminAction::Pressed { chat: from, button }).await
                } else {
                    self.send(messages::stale_button(from)).await;
                    Ok(())
                }
            },

            Inbound::Text(text) => {
                // A purchase waiting for input wins over an open panel
                let buyer_waits = self
                    .buyers
                    .state(from, BuyerSession::accepts_text)
                    .await
                    .unwrap_or(false);
                if buyer_waits {
                    self.buyers.send(from, BuyerAction::Text { chat: from, text }).await
                } else if self.admins.is_active(from) {
                    self.admins.send(from, AdminAction::Text { chat: from, text }).await
                } else if self.buyers.is_active(from) {
                    self.buyers.send(from, BuyerAction::Text { chat: from, text }).await
                } else {
                    self.send(messages::buy_hint(from)).await;
                    Ok(())
                }
            },
            Inbound::Scan(payload) => {
                if self.admins.is_active(from) {
                    self.admins.send(from, AdminAction::Scan { chat: from, payload }).await
                } else if self.buyers.is_active(from) {
                    self.send(messages::use_buttons(from)).await;
                    Ok(())
                } else {
                    self.send(messages::buy_hint(from)).await;
                    Ok(())
                }
            },
        };

        if let Err(error) = outcome {
            tracing::error!(chat = %from, kind, %error, "Turn aborted");
            self.send(messages::apology(from)).await;
        }
    }

    /// Drains the pending table. Call once the server stopped accepting updates.
    pub fn shutdown(&self) {
        let abandoned = self.pending.abandon_all();
        tracing::info!(
            abandoned = abandoned.len(),
            buyers = self.buyers.active_sessions(),
            admins = self.admins.active_sessions(),
            "Ticket desk stopped"
        );
    }

    async fn cancel(&self, from: ChatId) -> Result<(), StoreError> {
        if self.admins.is_active(from) {
            self.admins.send(from, AdminAction::Cancel { chat: from }).await?;
        }
        if self.buyers.is_active(from) {
            self.buyers.send(from, BuyerAction::Cancel { chat: from }).await?;
        }
        self.send(messages::cancelled(from)).await;
        Ok(())
    }

    async fn decide(&self, from: ChatId, token: ReferenceToken, decision: Decision) {
        match self.approvals.decide(from, token, decision).await {
            Ok(outcome) => tracing::debug!(chat = %from, ?outcome, "Payment decision handled"),
            Err(error) => tracing::warn!(chat = %from, %error, "Payment decision refused"),
        }
    }

    async fn send(&self, message: OutboundMessage) {
        let to = message.to;
        if let Err(error) = self.notifier.deliver(message).await {
            tracing::error!(chat = %to, %error, "Reply delivery failed");
        }
    }
}
