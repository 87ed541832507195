//! Collaborator ports.
//!
//! The conversations never talk to storage, Telegram or image libraries
//! directly. They hold `Arc<dyn Port>` handles in their environments; production
//! wires the Postgres/Telegram/QR adapters, tests wire the in-memory fakes.
//!
//! Every method returns a boxed `'static + Send` future so that reducers can
//! move a cloned handle into an [`Effect::Future`](crate::effect::Effect).

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{
    ChatId, DiscountCode, DiscountCodeId, DiscountPercent, Money, NewTicket, Product, ProductId,
    ReferenceToken, Ticket, TicketId,
};

/// Boxed future returned by every port method.
pub type PortFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

// ============================================================================
// Record Store
// ============================================================================

/// Durable storage for products, tickets, discount codes and their product links.
pub trait RecordStore: Send + Sync {
    /// Creates the tables if absent and seeds the default products.
    ///
    /// # Errors
    ///
    /// [`DeskError::Persistence`](crate::error::DeskError::Persistence) when storage is unavailable.
    fn ensure_schema(&self) -> PortFuture<()>;

    /// Active products, most expensive first.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn active_products(&self) -> PortFuture<Vec<Product>>;

    /// Product by unique name, active or not.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn product_by_name(&self, name: String) -> PortFuture<Option<Product>>;

    /// Product by identifier, active or not.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn product_by_id(&self, id: ProductId) -> PortFuture<Option<Product>>;

    /// Overwrites a product's price. Returns `false` when no product has that name.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn update_product_price(&self, name: String, price: Money) -> PortFuture<bool>;

    /// Discount code by its (upper-case) code, with associated product names.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn find_discount_code(&self, code: String) -> PortFuture<Option<DiscountCode>>;

    /// Every discount code, newest first. Product lists are left empty.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn list_discount_codes(&self) -> PortFuture<Vec<DiscountCode>>;

    /// Creates an active discount code.
    ///
    /// # Errors
    ///
    /// [`DeskError::AlreadyExists`](crate::error::DeskError::AlreadyExists) when the code is taken,
    /// storage failure otherwise.
    fn insert_discount_code(&self, code: String, percent: DiscountPercent) -> PortFuture<DiscountCode>;

    /// Sets a code's active flag. Returns `false` when the code does not exist.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn set_discount_code_active(&self, id: DiscountCodeId, active: bool) -> PortFuture<bool>;

    /// Products associated with a code.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn discount_code_products(&self, id: DiscountCodeId) -> PortFuture<Vec<ProductId>>;

    /// Links a product to a code; linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn add_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()>;

    /// Unlinks a product from a code; unlinking a missing link is a no-op.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn remove_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()>;

    /// Inserts an inactive ticket stamped with the current time.
    ///
    /// # Errors
    ///
    /// [`DeskError::AlreadyExists`](crate::error::DeskError::AlreadyExists) on a duplicate
    /// identifier, storage failure otherwise.
    fn insert_ticket(&self, ticket: NewTicket) -> PortFuture<Ticket>;

    /// Ticket by identifier.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn find_ticket(&self, id: TicketId) -> PortFuture<Option<Ticket>>;

    /// Marks an inactive ticket active.
    ///
    /// Returns `true` only when a row went from inactive to active; missing and
    /// already-active tickets return `false` and are left untouched.
    ///
    /// # Errors
    ///
    /// Storage failure.
    fn activate_ticket(&self, id: TicketId) -> PortFuture<bool>;
}

// ============================================================================
// Notification Channel
// ============================================================================

/// One inline button: label plus opaque payload sent back when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Payload delivered back as a callback
    pub payload: String,
}

impl Button {
    /// Creates a button
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Inline keyboard, one button per row.
pub type Keyboard = Vec<Button>;

/// Message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// HTML-formatted text
    Text(String),
    /// PNG image with an HTML-formatted caption
    Photo {
        /// Encoded PNG
        png: Vec<u8>,
        /// Caption under the image
        caption: String,
    },
}

/// A message addressed to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient
    pub to: ChatId,
    /// Content
    pub body: MessageBody,
    /// Buttons under the message (empty for none)
    pub keyboard: Keyboard,
}

impl OutboundMessage {
    /// Text message without buttons
    pub fn text(to: ChatId, text: impl Into<String>) -> Self {
        Self {
            to,
            body: MessageBody::Text(text.into()),
            keyboard: Vec::new(),
        }
    }

    /// Photo message without buttons
    pub fn photo(to: ChatId, png: Vec<u8>, caption: impl Into<String>) -> Self {
        Self {
            to,
            body: MessageBody::Photo {
                png,
                caption: caption.into(),
            },
            keyboard: Vec::new(),
        }
    }

    /// Attaches buttons
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Text or caption of the message
    #[must_use]
    pub fn text_content(&self) -> &str {
        match &self.body {
            MessageBody::Text(text) => text,
            MessageBody::Photo { caption, .. } => caption,
        }
    }
}

/// Delivers messages to chats.
pub trait Notifier: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// [`DeskError::Delivery`](crate::error::DeskError::Delivery) when the channel refuses it.
    fn deliver(&self, message: OutboundMessage) -> PortFuture<()>;
}

// ============================================================================
// QR codec and identifiers
// ============================================================================

/// Renders and reads the scannable ticket artifact.
pub trait QrCodec: Send + Sync {
    /// Encodes a payload as a PNG QR code.
    ///
    /// # Errors
    ///
    /// [`DeskError::Validation`](crate::error::DeskError::Validation) when the payload cannot be encoded.
    fn render_png(&self, payload: &str) -> Result<Vec<u8>>;

    /// Reads the first QR code in an image; trimmed and upper-cased. `None` when nothing is found.
    fn decode(&self, image: &[u8]) -> Option<String>;
}

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync {
    /// New ticket identifier
    fn ticket_id(&self) -> TicketId;

    /// New payment reference
    fn reference_token(&self) -> ReferenceToken;
}

/// Random identifiers from v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn ticket_id(&self) -> TicketId {
        TicketId::generate()
    }

    fn reference_token(&self) -> ReferenceToken {
        ReferenceToken::generate()
    }
}
