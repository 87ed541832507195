//! Payments waiting for the operator's decision.
//!
//! The table lives in process memory only. A restart loses it; shutdown
//! drains it through [`PendingTransactions::abandon_all`] so the abandoned
//! references end up in the log.

use crate::metrics;
use boxoffice_core::types::{ChatId, Money, ProductId, ReferenceToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A purchase the buyer reports as paid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Where the ticket goes
    pub buyer_chat: ChatId,
    /// Name as entered
    pub buyer_name: String,
    /// Email as entered
    pub buyer_email: String,
    /// Tier bought
    pub product_id: ProductId,
    /// Tier name at the time of purchase
    pub product_name: String,
    /// Price after discount
    pub final_price: Money,
}

/// Shared table keyed by reference token.
///
/// Every entry is consumed at most once: [`take`](Self::take) removes it
/// atomically, so two concurrent approvals cannot both see it.
#[derive(Debug, Clone, Default)]
pub struct PendingTransactions {
    inner: Arc<Mutex<HashMap<ReferenceToken, PendingTransaction>>>,
}

impl PendingTransactions {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transaction. Returns `false` if the token is already taken.
    pub fn insert(&self, token: ReferenceToken, transaction: PendingTransaction) -> bool {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(&token) {
            return false;
        }
        table.insert(token, transaction);
        Self::report(table.len());
        true
    }

    /// Removes and returns a transaction
    pub fn take(&self, token: &ReferenceToken) -> Option<PendingTransaction> {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let taken = table.remove(token);
        Self::report(table.len());
        taken
    }

    /// Whether a token is waiting
    pub fn contains(&self, token: &ReferenceToken) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token)
    }

    /// Number of waiting transactions
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the table, logging every entry that never got a decision.
    pub fn abandon_all(&self) -> Vec<(ReferenceToken, PendingTransaction)> {
        let drained: Vec<_> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for (token, transaction) in &drained {
            tracing::warn!(
                reference = %token,
                buyer_chat = %transaction.buyer_chat,
                product = %transaction.product_name,
                final_price = transaction.final_price.amount(),
                "Payment abandoned without a decision"
            );
        }
        Self::report(0);
        drained
    }

    #[allow(clippy::cast_precision_loss)]
    fn report(len: usize) {
        ::metrics::gauge!(metrics::PAYMENTS_PENDING).set(len as f64);
    }
}
