//! Operator panel.
//!
//! Reachable only from the configured operator chat and only after the
//! password. From the menu the operator checks and activates tickets, edits
//! prices, manages discount codes and issues free tickets.

mod reducer;

#[cfg(test)]
mod tests;

pub use reducer::AdminReducer;

use crate::command::AdminButton;
use crate::issuance::{IssueRequest, Issuer};
use boxoffice_core::error::Result;
use boxoffice_core::ports::{Notifier, QrCodec, RecordStore};
use boxoffice_core::types::{ChatId, DiscountCode, Money, Product, ProductId, Ticket, TicketId};
use boxoffice_runtime::Session;
use std::sync::Arc;

/// Why a product list or product was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductPurpose {
    /// Price editing
    Pricing,
    /// Free ticket issuance
    Issuing,
}

/// Panel session of the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AdminSession {
    /// Not in the panel
    #[default]
    Idle,
    /// `/admin` accepted, password expected
    AwaitingPassword,
    /// Main menu shown
    Menu,
    /// Ticket id or QR photo expected
    CheckingTicket,
    /// Product list for price editing shown
    ChoosingPriceProduct,
    /// New price expected
    EnteringPrice {
        /// Product being repriced
        product: Product,
    },
    /// Discount code menu shown
    PromoMenu,
    /// `CODE PERCENT` expected
    EnteringPromo,
    /// Product membership of a new code being edited
    LinkingPromoProducts {
        /// The new code
        code: DiscountCode,
    },
    /// Code list shown
    ListingPromos,
    /// Product list for a free ticket shown
    ChoosingIssueProduct,
    /// Holder name expected
    EnteringIssueName {
        /// Ticket tier
        product: Product,
    },
    /// Holder email expected
    EnteringIssueEmail {
        /// Ticket tier
        product: Product,
        /// Holder name
        name: String,
    },
    /// Confirmation screen shown
    ConfirmingIssue {
        /// Ticket tier
        product: Product,
        /// Holder name
        name: String,
        /// Holder email
        email: String,
    },
}

impl AdminSession {
    /// Step name for logs and assertions
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPassword => "awaiting_password",
            Self::Menu => "menu",
            Self::CheckingTicket => "checking_ticket",
            Self::ChoosingPriceProduct => "choosing_price_product",
            Self::EnteringPrice { .. } => "entering_price",
            Self::PromoMenu => "promo_menu",
            Self::EnteringPromo => "entering_promo",
            Self::LinkingPromoProducts { .. } => "linking_promo_products",
            Self::ListingPromos => "listing_promos",
            Self::ChoosingIssueProduct => "choosing_issue_product",
            Self::EnteringIssueName { .. } => "entering_issue_name",
            Self::EnteringIssueEmail { .. } => "entering_issue_email",
            Self::ConfirmingIssue { .. } => "confirming_issue",
        }
    }

    /// Whether the password has been accepted
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        !matches!(self, Self::Idle | Self::AwaitingPassword)
    }
}

impl Session for AdminSession {
    fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Inputs of the operator panel, including store results fed back
#[derive(Debug)]
pub enum AdminAction {
    /// `/admin`
    Enter {
        /// Sender
        chat: ChatId,
    },
    /// Free text
    Text {
        /// Operator
        chat: ChatId,
        /// What they typed
        text: String,
    },
    /// Photo run through the QR decoder
    Scan {
        /// Operator
        chat: ChatId,
        /// Decoded payload, `None` when no code was found
        payload: Option<String>,
    },
    /// Inline button
    Pressed {
        /// Operator
        chat: ChatId,
        /// Which button
        button: AdminButton,
    },
    /// Global `/cancel`; resets silently, the dispatcher replies
    Cancel {
        /// Operator
        chat: ChatId,
    },
    /// Ticket lookup finished
    TicketLoaded {
        /// Operator
        chat: ChatId,
        /// Id looked up
        id: TicketId,
        /// Lookup outcome
        result: Result<Option<Ticket>>,
    },
    /// Conditional activation finished
    Activated {
        /// Operator
        chat: ChatId,
        /// Ticket
        id: TicketId,
        /// Whether a row switched to active
        result: Result<bool>,
    },
    /// Active products loaded
    ProductsLoaded {
        /// Operator
        chat: ChatId,
        /// Which sub-flow asked
        purpose: ProductPurpose,
        /// Lookup outcome
        result: Result<Vec<Product>>,
    },
    /// One product resolved by id
    ProductLoaded {
        /// Operator
        chat: ChatId,
        /// Which sub-flow asked
        purpose: ProductPurpose,
        /// Lookup outcome
        result: Result<Option<Product>>,
    },
    /// Price write finished
    PriceUpdated {
        /// Operator
        chat: ChatId,
        /// Product repriced
        product_name: String,
        /// New price
        price: Money,
        /// Whether a row matched
        result: Result<bool>,
    },
    /// Code insert finished
    CodeCreated {
        /// Operator
        chat: ChatId,
        /// Code as entered, upper-cased
        code: String,
        /// Insert outcome
        result: Result<DiscountCode>,
    },
    /// Membership screen data loaded
    LinkingLoaded {
        /// Operator
        chat: ChatId,
        /// Active products and the ones linked to the code
        result: Result<(Vec<Product>, Vec<ProductId>)>,
    },
    /// Code list loaded
    CodesLoaded {
        /// Operator
        chat: ChatId,
        /// Outcome of the flip that triggered the reload
        notice: Option<&'static str>,
        /// Lookup outcome
        result: Result<Vec<DiscountCode>>,
    },
}

/// Collaborators of the operator panel
#[derive(Clone)]
pub struct AdminEnvironment {
    /// Products, codes and tickets
    pub records: Arc<dyn RecordStore>,
    /// Outbound messages
    pub notifier: Arc<dyn Notifier>,
    /// QR rendering for activation notices
    pub qr: Arc<dyn QrCodec>,
    /// Free ticket issuance
    pub issuer: Issuer,
    /// The only chat allowed in
    pub operator: ChatId,
    /// Panel password
    pub password: String,
}

impl AdminEnvironment {
    /// Free ticket for `product`, addressed to the operator's own chat
    fn free_ticket(&self, product: &Product, name: String, email: String) -> IssueRequest {
        IssueRequest {
            product_name: product.name.clone(),
            buyer_name: name,
            buyer_email: email,
            buyer_chat: self.operator,
            final_price: Money::ZERO,
        }
    }
}
