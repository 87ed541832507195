//! Purchase conversation.
//!
//! `/buy` → tier → discount code (or skip) → name → email → summary →
//! payment link → "I have paid". The last step parks the order in the
//! [`PendingTransactions`] table and asks the operator to confirm it.

use crate::command::BuyerButton;
use crate::{messages, reply};
use crate::pending::{PendingTransaction, PendingTransactions};
use boxoffice_core::effect::Effect;
use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::{IdGenerator, Notifier, RecordStore};
use boxoffice_core::reducer::Reducer;
use boxoffice_core::types::{ChatId, DiscountCode, Money, Product, ProductId};
use boxoffice_core::{SmallVec, async_effect, smallvec, validation};
use boxoffice_runtime::Session;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// The tier chosen and the price that applies to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen tier
    pub product_id: ProductId,
    /// Tier name
    pub product_name: String,
    /// List price when chosen
    pub initial_price: Money,
    /// Price after discount
    pub final_price: Money,
    /// Accepted discount code
    pub code: Option<String>,
}

/// Purchase session of one buyer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuyerSession {
    /// No purchase in progress
    #[default]
    Idle,
    /// Tier list shown
    SelectingProduct,
    /// Waiting for a discount code or "skip"
    WaitingPromoOrSkip {
        /// Tier and price so far
        selection: Selection,
    },
    /// Waiting for the holder's name
    EnteringName {
        /// Tier and price
        selection: Selection,
    },
    /// Waiting for the holder's email
    EnteringEmail {
        /// Tier and price
        selection: Selection,
        /// Holder name
        name: String,
    },
    /// Summary shown; waiting for payment
    ConfirmingPayment {
        /// Tier and price
        selection: Selection,
        /// Holder name
        name: String,
        /// Holder email
        email: String,
    },
}

impl BuyerSession {
    /// Step name for logs and assertions
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SelectingProduct => "selecting_product",
            Self::WaitingPromoOrSkip { .. } => "waiting_promo_or_skip",
            Self::EnteringName { .. } => "entering_name",
            Self::EnteringEmail { .. } => "entering_email",
            Self::ConfirmingPayment { .. } => "confirming_payment",
        }
    }

    /// Whether this step consumes free text
    #[must_use]
    pub const fn accepts_text(&self) -> bool {
        matches!(
            self,
            Self::WaitingPromoOrSkip { .. } | Self::EnteringName { .. } | Self::EnteringEmail { .. }
        )
    }

    /// The current selection, if a tier has been chosen
    #[must_use]
    pub const fn selection(&self) -> Option<&Selection> {
        match self {
            Self::Idle | Self::SelectingProduct => None,
            Self::WaitingPromoOrSkip { selection }
            | Self::EnteringName { selection }
            | Self::EnteringEmail { selection, .. }
            | Self::ConfirmingPayment { selection, .. } => Some(selection),
        }
    }
}

impl Session for BuyerSession {
    fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs of the purchase conversation, including store results fed back
#[derive(Debug)]
pub enum BuyerAction {
    /// `/buy`
    Start {
        /// Buyer
        chat: ChatId,
    },
    /// Free text
    Text {
        /// Buyer
        chat: ChatId,
        /// What they typed
        text: String,
    },
    /// Inline button
    Pressed {
        /// Buyer
        chat: ChatId,
        /// Which button
        button: BuyerButton,
    },
    /// Global `/cancel`; resets silently, the dispatcher replies
    Cancel {
        /// Buyer
        chat: ChatId,
    },
    /// Active tiers loaded
    ProductsLoaded {
        /// Buyer
        chat: ChatId,
        /// Lookup outcome
        result: Result<Vec<Product>>,
    },
    /// Chosen tier resolved
    ProductLoaded {
        /// Buyer
        chat: ChatId,
        /// Lookup outcome
        result: Result<Option<Product>>,
    },
    /// Discount code resolved
    CodeLoaded {
        /// Buyer
        chat: ChatId,
        /// Lookup outcome
        result: Result<Option<DiscountCode>>,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Collaborators of the purchase conversation
#[derive(Clone)]
pub struct BuyerEnvironment {
    /// Products and discount codes
    pub records: Arc<dyn RecordStore>,
    /// Outbound messages
    pub notifier: Arc<dyn Notifier>,
    /// Reference tokens
    pub ids: Arc<dyn IdGenerator>,
    /// Orders waiting for the operator
    pub pending: PendingTransactions,
    /// Who confirms payments
    pub operator: ChatId,
    /// Shown on the payment screen
    pub payment_link: String,
}

// ============================================================================
// Reducer
// ============================================================================

/// Transition rules of the purchase conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerReducer;

type Effects = SmallVec<[Effect<BuyerAction>; 4]>;

impl BuyerReducer {
    fn load_products(env: &BuyerEnvironment, chat: ChatId) -> Effect<BuyerAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = records.active_products().await;
            Some(BuyerAction::ProductsLoaded { chat, result })
        }
    }

    fn failed(state: &mut BuyerSession, env: &BuyerEnvironment, chat: ChatId, error: &DeskError) -> Effects {
        tracing::error!(chat = %chat, step = state.step(), %error, "Purchase aborted by store failure");
        *state = BuyerSession::Idle;
        smallvec![reply(&env.notifier, messages::apology(chat))]
    }

    fn on_text(state: &mut BuyerSession, env: &BuyerEnvironment, chat: ChatId, text: &str) -> Effects {
        match state {
            BuyerSession::WaitingPromoOrSkip { .. } => {
                let code = validation::discount_code(text);
                if code.is_empty() {
                    return smallvec![reply(&env.notifier, messages::code_rejected(chat))];
                }
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    let result = records.find_discount_code(code).await;
                    Some(BuyerAction::CodeLoaded { chat, result })
                }]
            },
            BuyerSession::EnteringName { selection } => match validation::buyer_name(text) {
                Ok(name) => {
                    *state = BuyerSession::EnteringEmail {
                        selection: selection.clone(),
                        name,
                    };
                    smallvec![reply(&env.notifier, messages::email_prompt(chat))]
                },
                Err(_) => smallvec![reply(&env.notifier, messages::name_too_short(chat))],
            },
            BuyerSession::EnteringEmail { selection, name } => match validation::email(text) {
                Ok(email) => {
                    let summary = messages::order_summary(
                        chat,
                        &selection.product_name,
                        name,
                        &email,
                        selection.code.as_deref(),
                        selection.final_price,
                    );
                    *state = BuyerSession::ConfirmingPayment {
                        selection: selection.clone(),
                        name: name.clone(),
                        email,
                    };
                    smallvec![reply(&env.notifier, summary)]
                },
                Err(_) => smallvec![reply(&env.notifier, messages::email_invalid(chat))],
            },
            BuyerSession::SelectingProduct | BuyerSession::ConfirmingPayment { .. } => {
                smallvec![reply(&env.notifier, messages::use_buttons(chat))]
            },
            BuyerSession::Idle => smallvec![reply(&env.notifier, messages::buy_hint(chat))],
        }
    }

    fn on_button(state: &mut BuyerSession, env: &BuyerEnvironment, chat: ChatId, button: BuyerButton) -> Effects {
        if state.is_idle() {
            return smallvec![reply(&env.notifier, messages::stale_button(chat))];
        }

        match button {
            BuyerButton::Cancel => {
                *state = BuyerSession::Idle;
                smallvec![reply(&env.notifier, messages::cancelled(chat))]
            },
            BuyerButton::Product(name) if matches!(state, BuyerSession::SelectingProduct) => {
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    let result = records.product_by_name(name).await;
                    Some(BuyerAction::ProductLoaded { chat, result })
                }]
            },
            BuyerButton::SkipCode => {
                let BuyerSession::WaitingPromoOrSkip { selection } = state else {
                    return smallvec![reply(&env.notifier, messages::stale_button(chat))];
                };
                let selection = Selection {
                    final_price: selection.initial_price,
                    code: None,
                    ..selection.clone()
                };
                let skipped = messages::code_skipped(chat, selection.final_price);
                *state = BuyerSession::EnteringName { selection };
                smallvec![reply(&env.notifier, skipped)]
            },
            BuyerButton::BackToProducts if matches!(state, BuyerSession::WaitingPromoOrSkip { .. }) => {
                *state = BuyerSession::Idle;
                smallvec![Self::load_products(env, chat)]
            },
            BuyerButton::Pay => {
                let BuyerSession::ConfirmingPayment { selection, .. } = state else {
                    return smallvec![reply(&env.notifier, messages::stale_button(chat))];
                };
                let screen = messages::payment_link(chat, selection.final_price, &env.payment_link);
                smallvec![reply(&env.notifier, screen)]
            },
            BuyerButton::Paid if matches!(state, BuyerSession::ConfirmingPayment { .. }) => {
                Self::submit(state, env, chat)
            },
            _ => smallvec![reply(&env.notifier, messages::stale_button(chat))],
        }
    }

    /// Parks the order and asks the operator to confirm it
    fn submit(state: &mut BuyerSession, env: &BuyerEnvironment, chat: ChatId) -> Effects {
        let BuyerSession::ConfirmingPayment { selection, name, email } = std::mem::take(state) else {
            return SmallVec::new();
        };

        let token = env.ids.reference_token();
        let transaction = PendingTransaction {
            buyer_chat: chat,
            buyer_name: name,
            buyer_email: email,
            product_id: selection.product_id,
            product_name: selection.product_name,
            final_price: selection.final_price,
        };
        if !env.pending.insert(token.clone(), transaction.clone()) {
            tracing::error!(chat = %chat, reference = %token, "Reference token collision");
            return smallvec![reply(&env.notifier, messages::apology(chat))];
        }
        tracing::info!(
            chat = %chat,
            reference = %token,
            product = %transaction.product_name,
            final_price = transaction.final_price.amount(),
            "Payment awaiting confirmation"
        );

        smallvec![
            reply(&env.notifier, messages::payment_notice(env.operator, &token, &transaction)),
            reply(&env.notifier, messages::payment_submitted(chat, &token)),
        ]
    }
}

impl Reducer for BuyerReducer {
    type State = BuyerSession;
    type Action = BuyerAction;
    type Environment = BuyerEnvironment;

    fn reduce(&self, state: &mut BuyerSession, action: BuyerAction, env: &BuyerEnvironment) -> Effects {
        match action {
            BuyerAction::Start { chat } => {
                *state = BuyerSession::Idle;
                smallvec![Self::load_products(env, chat)]
            },

            BuyerAction::Text { chat, text } => Self::on_text(state, env, chat, &text),

            BuyerAction::Pressed { chat, button } => Self::on_button(state, env, chat, button),

            BuyerAction::Cancel { chat } => {
                tracing::debug!(chat = %chat, step = state.step(), "Purchase cancelled");
                *state = BuyerSession::Idle;
                SmallVec::new()
            },

            BuyerAction::ProductsLoaded { chat, result } => match result {
                Ok(products) if products.is_empty() => {
                    *state = BuyerSession::Idle;
                    smallvec![reply(&env.notifier, messages::no_tiers(chat))]
                },
                Ok(products) => {
                    *state = BuyerSession::SelectingProduct;
                    smallvec![reply(&env.notifier, messages::tier_list(chat, &products))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },

            BuyerAction::ProductLoaded { chat, result } => match result {
                Ok(Some(product)) if product.active => {
                    let prompt = messages::code_prompt(chat, &product.name, product.price);
                    *state = BuyerSession::WaitingPromoOrSkip {
                        selection: Selection {
                            product_id: product.id,
                            product_name: product.name,
                            initial_price: product.price,
                            final_price: product.price,
                            code: None,
                        },
                    };
                    smallvec![reply(&env.notifier, prompt)]
                },
                Ok(_) => {
                    *state = BuyerSession::Idle;
                    smallvec![reply(&env.notifier, messages::tier_unavailable(chat))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },

            BuyerAction::CodeLoaded { chat, result } => {
                let BuyerSession::WaitingPromoOrSkip { selection } = state else {
                    return SmallVec::new();
                };
                match result {
                    // Product restrictions on codes are not enforced at purchase time
                    Ok(Some(code)) if code.active => {
                        let final_price = selection.initial_price.apply_discount(code.percent);
                        let applied = messages::code_applied(
                            chat,
                            &code.code,
                            code.percent,
                            selection.initial_price,
                            final_price,
                        );
                        let selection = Selection {
                            final_price,
                            code: Some(code.code),
                            ..selection.clone()
                        };
                        *state = BuyerSession::EnteringName { selection };
                        smallvec![reply(&env.notifier, applied)]
                    },
                    Ok(_) => smallvec![reply(&env.notifier, messages::code_rejected(chat))],
                    Err(error) => Self::failed(state, env, chat, &error),
                }
            },
        }
    }
}
