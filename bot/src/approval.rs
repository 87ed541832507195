//! Operator decisions on reported payments.
//!
//! Works outside the panel: the operator does not need to be logged in, only
//! to be the operator. Each reference token is decided at most once.

use crate::issuance::{IssueRequest, Issuer};
use crate::pending::PendingTransactions;
use crate::{messages, metrics};
use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::{Notifier, OutboundMessage};
use boxoffice_core::types::{ChatId, ReferenceToken};
use std::sync::Arc;

/// What the operator decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Payment received, issue the ticket
    Approve,
    /// Payment not received
    Reject,
}

/// How a decision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ticket issued and delivered
    Approved,
    /// Buyer told the payment was refused
    Rejected,
    /// Token unknown or already decided
    AlreadyProcessed,
    /// Approved but the ticket could not be stored
    IssuanceFailed,
}

/// Applies operator decisions to the pending table.
#[derive(Clone)]
pub struct ApprovalHandler {
    pending: PendingTransactions,
    issuer: Issuer,
    notifier: Arc<dyn Notifier>,
    operator: ChatId,
}

impl ApprovalHandler {
    /// Creates a handler; only `operator` may decide.
    #[must_use]
    pub fn new(pending: PendingTransactions, issuer: Issuer, notifier: Arc<dyn Notifier>, operator: ChatId) -> Self {
        Self {
            pending,
            issuer,
            notifier,
            operator,
        }
    }

    /// Decides the payment behind `token`.
    ///
    /// # Errors
    ///
    /// [`DeskError::Unauthorized`] when `from` is not the operator; the
    /// pending entry is left alone in that case.
    pub async fn decide(&self, from: ChatId, token: ReferenceToken, decision: Decision) -> Result<Outcome> {
        if from != self.operator {
            tracing::warn!(chat = %from, reference = %token, ?decision, "Payment decision from a non-operator");
            self.send(messages::not_operator(from)).await;
            return Err(DeskError::Unauthorized);
        }

        let Some(transaction) = self.pending.take(&token) else {
            tracing::info!(reference = %token, ?decision, "Payment already decided or unknown");
            self.send(messages::unknown_reference(from, &token)).await;
            return Ok(Outcome::AlreadyProcessed);
        };

        match decision {
            Decision::Approve => {
                let request = IssueRequest {
                    product_name: transaction.product_name,
                    buyer_name: transaction.buyer_name.clone(),
                    buyer_email: transaction.buyer_email,
                    buyer_chat: transaction.buyer_chat,
                    final_price: transaction.final_price,
                };
                match self.issuer.issue(request).await {
                    Ok(ticket) => {
                        ::metrics::counter!(metrics::PAYMENTS_APPROVED).increment(1);
                        tracing::info!(reference = %token, ticket = %ticket.id, "Payment approved");
                        self.send(messages::approved(from, &transaction.buyer_name, transaction.final_price))
                            .await;
                        Ok(Outcome::Approved)
                    },
                    Err(error) => {
                        tracing::error!(reference = %token, %error, "Approved payment could not be issued");
                        self.send(messages::approval_failed(from, &token)).await;
                        Ok(Outcome::IssuanceFailed)
                    },
                }
            },
            Decision::Reject => {
                ::metrics::counter!(metrics::PAYMENTS_REJECTED).increment(1);
                tracing::info!(reference = %token, buyer_chat = %transaction.buyer_chat, "Payment rejected");
                self.send(messages::rejected(from, &token)).await;
                self.send(messages::rejected_to_buyer(transaction.buyer_chat)).await;
                Ok(Outcome::Rejected)
            },
        }
    }

    async fn send(&self, message: OutboundMessage) {
        let to = message.to;
        if let Err(error) = self.notifier.deliver(message).await {
            tracing::error!(chat = %to, %error, "Approval message delivery failed");
        }
    }
}
