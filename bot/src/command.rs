//! Inbound updates, decoded once at the transport boundary.
//!
//! Inline buttons carry a [`Callback`] as their payload. The string form is
//! compact because Telegram caps callback data at 64 bytes.

use boxoffice_core::types::{DiscountCodeId, ProductId, ReferenceToken, TicketId};
use std::fmt;

/// Slash commands the desk understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/start`
    Start,
    /// `/buy`
    Buy,
    /// `/admin`
    Admin,
    /// `/cancel`
    Cancel,
}

impl SlashCommand {
    /// Every command with its menu description, in menu order
    pub const MENU: [(Self, &'static str); 4] = [
        (Self::Start, "🏠 Главное меню"),
        (Self::Buy, "🛒 Купить билет"),
        (Self::Cancel, "❌ Отменить текущее действие"),
        (Self::Admin, "🔑 Режим администратора"),
    ];

    /// Parses `/name`, `/name@BotName` and `/name arguments`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name {
            "start" => Some(Self::Start),
            "buy" => Some(Self::Buy),
            "admin" => Some(Self::Admin),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Command name without the slash
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Buy => "buy",
            Self::Admin => "admin",
            Self::Cancel => "cancel",
        }
    }
}

/// Buttons of the purchase flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerButton {
    /// A tier from the list, by name
    Product(String),
    /// Continue without a discount code
    SkipCode,
    /// Back to the tier list
    BackToProducts,
    /// Show the payment link
    Pay,
    /// "I have paid"
    Paid,
    /// Abandon the purchase
    Cancel,
}

/// Buttons of the administrator panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminButton {
    /// Main menu: ticket check
    CheckTicket,
    /// Main menu: price editing
    EditPrices,
    /// Main menu: discount codes
    Promos,
    /// Main menu: manual issuance
    IssueTicket,
    /// Main menu: leave the panel
    Exit,
    /// Back to the main menu
    MainMenu,
    /// Activate a looked-up ticket
    Activate(TicketId),
    /// Product whose price is edited
    EditPrice(ProductId),
    /// Discount codes: create one
    AddPromo,
    /// Discount codes: list them
    ListPromos,
    /// Set a code's active flag
    TogglePromo {
        /// Code to change
        id: DiscountCodeId,
        /// New value of the flag
        active: bool,
    },
    /// Flip a product's membership for the code being linked
    LinkProduct(ProductId),
    /// Finish linking products
    FinishLinking,
    /// Product for a manual ticket
    IssueProduct(ProductId),
    /// Confirm the manual ticket
    ConfirmIssue,
}

/// Inline button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Purchase flow button
    Buyer(BuyerButton),
    /// Administrator panel button
    Admin(AdminButton),
    /// Payment confirmed by the operator
    Approve(ReferenceToken),
    /// Payment refused by the operator
    Reject(ReferenceToken),
}

impl Callback {
    /// String form carried by the button
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses a button payload; `None` for anything this desk did not emit.
    #[must_use]
    pub fn decode(payload: &str) -> Option<Self> {
        let (tag, rest) = payload.split_once(':').unwrap_or((payload, ""));
        let callback = match (tag, rest) {
            ("buy", name) if !name.is_empty() => Self::Buyer(BuyerButton::Product(name.to_owned())),
            ("skip", "") => Self::Buyer(BuyerButton::SkipCode),
            ("back", "") => Self::Buyer(BuyerButton::BackToProducts),
            ("pay", "") => Self::Buyer(BuyerButton::Pay),
            ("paid", "") => Self::Buyer(BuyerButton::Paid),
            ("cancel", "") => Self::Buyer(BuyerButton::Cancel),
            ("menu", item) => Self::Admin(match item {
                "check" => AdminButton::CheckTicket,
                "prices" => AdminButton::EditPrices,
                "promo" => AdminButton::Promos,
                "issue" => AdminButton::IssueTicket,
                "exit" => AdminButton::Exit,
                "main" => AdminButton::MainMenu,
                _ => return None,
            }),
            ("act", id) => Self::Admin(AdminButton::Activate(TicketId::from_input(id)?)),
            ("price", id) => Self::Admin(AdminButton::EditPrice(ProductId::new(id.parse().ok()?))),
            ("promo", "add") => Self::Admin(AdminButton::AddPromo),
            ("promo", "list") => Self::Admin(AdminButton::ListPromos),
            ("promo", toggle) => {
                let (flag, id) = toggle.split_once(':')?;
                let active = match flag {
                    "on" => true,
                    "off" => false,
                    _ => return None,
                };
                Self::Admin(AdminButton::TogglePromo {
                    id: DiscountCodeId::new(id.parse().ok()?),
                    active,
                })
            },
            ("link", "done") => Self::Admin(AdminButton::FinishLinking),
            ("link", id) => Self::Admin(AdminButton::LinkProduct(ProductId::new(id.parse().ok()?))),
            ("issue", "confirm") => Self::Admin(AdminButton::ConfirmIssue),
            ("issue", id) => Self::Admin(AdminButton::IssueProduct(ProductId::new(id.parse().ok()?))),
            ("approve", token) => Self::Approve(ReferenceToken::parse(token)?),
            ("reject", token) => Self::Reject(ReferenceToken::parse(token)?),
            _ => return None,
        };
        Some(callback)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer(button) => match button {
                BuyerButton::Product(name) => write!(f, "buy:{name}"),
                BuyerButton::SkipCode => f.write_str("skip"),
                BuyerButton::BackToProducts => f.write_str("back"),
                BuyerButton::Pay => f.write_str("pay"),
                BuyerButton::Paid => f.write_str("paid"),
                BuyerButton::Cancel => f.write_str("cancel"),
            },
            Self::Admin(button) => match button {
                AdminButton::CheckTicket => f.write_str("menu:check"),
                AdminButton::EditPrices => f.write_str("menu:prices"),
                AdminButton::Promos => f.write_str("menu:promo"),
                AdminButton::IssueTicket => f.write_str("menu:issue"),
                AdminButton::Exit => f.write_str("menu:exit"),
                AdminButton::MainMenu => f.write_str("menu:main"),
                AdminButton::Activate(id) => write!(f, "act:{id}"),
                AdminButton::EditPrice(id) => write!(f, "price:{id}"),
                AdminButton::AddPromo => f.write_str("promo:add"),
                AdminButton::ListPromos => f.write_str("promo:list"),
                AdminButton::TogglePromo { id, active } => {
                    write!(f, "promo:{}:{id}", if *active { "on" } else { "off" })
                },
                AdminButton::LinkProduct(id) => write!(f, "link:{id}"),
                AdminButton::FinishLinking => f.write_str("link:done"),
                AdminButton::IssueProduct(id) => write!(f, "issue:{id}"),
                AdminButton::ConfirmIssue => f.write_str("issue:confirm"),
            },
            Self::Approve(token) => write!(f, "approve:{token}"),
            Self::Reject(token) => write!(f, "reject:{token}"),
        }
    }
}

/// One chat update, reduced to what the conversations act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A recognised slash command
    Command(SlashCommand),
    /// Free text
    Text(String),
    /// A photo run through the QR decoder; `None` when no code was found
    Scan(Option<String>),
    /// An inline button press
    Callback(Callback),
}

impl Inbound {
    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Text(_) => "text",
            Self::Scan(_) => "scan",
            Self::Callback(_) => "callback",
        }
    }
}
