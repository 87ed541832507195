//! Domain types for the ticket desk.
//!
//! Value objects (identifiers, money, discount percentages) and the three
//! durable records the desk works with: products, tickets and discount codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::DeskError;

// ============================================================================
// Identifiers
// ============================================================================

/// Chat identity of a Telegram user (also the recipient of notifications).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(i64);

impl ChatId {
    /// Wraps a raw chat identifier
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw chat identifier
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier of a product
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(i32);

impl ProductId {
    /// Wraps a raw product identifier
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Raw product identifier
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier of a discount code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscountCodeId(i32);

impl DiscountCodeId {
    /// Wraps a raw discount code identifier
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Raw discount code identifier
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for DiscountCodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque ticket identifier: twelve upper-case hex characters.
///
/// Generated tickets always have this shape; identifiers typed in by an
/// operator are only normalised (trimmed and upper-cased) so that a lookup of
/// a mistyped id simply misses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Length of a generated identifier
    pub const LEN: usize = 12;

    /// Creates a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(hex.chars().take(Self::LEN).collect())
    }

    /// Normalises operator input into an identifier.
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn from_input(input: &str) -> Option<Self> {
        let normalized = input.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Wraps a stored identifier without normalisation
    #[must_use]
    pub const fn from_stored(id: String) -> Self {
        Self(id)
    }

    /// String form of the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short reference correlating a buyer's payment claim with the operator's decision.
///
/// Eight upper-case hex characters (the first group of a v4 UUID).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceToken(String);

impl ReferenceToken {
    /// Upper bound accepted when parsing tokens from button payloads
    const MAX_LEN: usize = 32;

    /// Creates a fresh random token
    #[must_use]
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().to_string();
        let first_group = uuid.split('-').next().unwrap_or_default();
        Self(first_group.to_uppercase())
    }

    /// Parses a token received back from a button payload.
    ///
    /// Accepts non-empty ASCII alphanumeric strings; case is normalised.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(raw.to_ascii_uppercase()))
    }

    /// String form of the token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Whole-ruble amount, never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Largest amount the `INTEGER` price columns can hold
    pub const MAX: Self = Self(2_147_483_647);

    /// Zero amount (free tickets)
    pub const ZERO: Self = Self(0);

    /// Creates an amount
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// The raw amount
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses an operator-entered price: a non-negative integer that fits the price column.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Validation`] for anything else (signs, decimals, overflow).
    pub fn parse(input: &str) -> Result<Self, DeskError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DeskError::Validation(format!("not a price: {trimmed:?}")));
        }
        let amount = trimmed
            .parse::<u64>()
            .map_err(|_| DeskError::Validation(format!("price out of range: {trimmed}")))?;
        if amount > Self::MAX.0 {
            return Err(DeskError::Validation(format!("price out of range: {trimmed}")));
        }
        Ok(Self(amount))
    }

    /// Applies a percentage discount, rounding down: `floor(amount × (100 − p) / 100)`.
    ///
    /// Splitting the amount into hundreds and remainder keeps the arithmetic
    /// exact without widening.
    #[must_use]
    pub const fn apply_discount(self, percent: DiscountPercent) -> Self {
        let keep = 100 - percent.get() as u64;
        let hundreds = self.0 / 100;
        let rest = self.0 % 100;
        Self(hundreds * keep + rest * keep / 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ₽", self.0)
    }
}

/// Discount percentage, always within 1..=99.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// Smallest accepted percentage
    pub const MIN: u8 = 1;
    /// Largest accepted percentage
    pub const MAX: u8 = 99;

    /// Validates a percentage.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Validation`] when the value is outside 1..=99.
    pub fn new(percent: i64) -> Result<Self, DeskError> {
        u8::try_from(percent)
            .ok()
            .filter(|p| (Self::MIN..=Self::MAX).contains(p))
            .map(Self)
            .ok_or_else(|| DeskError::Validation(format!("discount percent out of range: {percent}")))
    }

    /// The percentage value
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Tier inserted at first boot when no product with that name exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedProduct {
    /// Unique name
    pub name: &'static str,
    /// Description shown to buyers
    pub description: &'static str,
    /// Initial price
    pub price: Money,
}

/// Default tiers, seeded by every record store.
pub const DEFAULT_PRODUCTS: [SeedProduct; 3] = [
    SeedProduct {
        name: "VIP",
        description: "Включает доступ в VIP-зону и Fast-Pass.",
        price: Money::new(15000),
    },
    SeedProduct {
        name: "STANDART",
        description: "Базовый вход, доступ в основную зону.",
        price: Money::new(5000),
    },
    SeedProduct {
        name: "1+1",
        description: "Два билета по цене одного, ограниченное предложение.",
        price: Money::new(7500),
    },
];

/// A purchasable ticket tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Database identifier
    pub id: ProductId,
    /// Unique display name (also the buyer's button payload)
    pub name: String,
    /// Free-form description shown in the tier list
    pub description: String,
    /// Current price
    pub price: Money,
    /// Whether buyers can see and pick it
    pub active: bool,
}

/// A redeemable discount code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    /// Database identifier
    pub id: DiscountCodeId,
    /// Unique upper-case code
    pub code: String,
    /// Discount granted on redemption
    pub percent: DiscountPercent,
    /// Whether the code can be redeemed
    pub active: bool,
    /// Names of associated products (filled when fetched by code)
    pub products: Vec<String>,
}

/// Ticket row before insertion; the store stamps the purchase time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicket {
    /// Fresh identifier
    pub id: TicketId,
    /// Name of the purchased tier
    pub product_name: String,
    /// Buyer full name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Chat the ticket is delivered to
    pub buyer_chat: ChatId,
    /// Price actually charged
    pub final_price: Money,
}

/// A persisted ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier
    pub id: TicketId,
    /// Name of the purchased tier
    pub product_name: String,
    /// Buyer full name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Chat the ticket was delivered to, when known
    pub buyer_chat: Option<ChatId>,
    /// Price actually charged
    pub final_price: Money,
    /// Activation flag; only ever goes from false to true
    pub active: bool,
    /// Insertion time
    pub purchased_at: DateTime<Utc>,
}

impl Ticket {
    /// Purchase time as shown to users (`dd.mm.yyyy HH:MM`)
    #[must_use]
    pub fn purchased_display(&self) -> String {
        self.purchased_at.format("%d.%m.%Y %H:%M").to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn standart_with_sale15_costs_4250() {
        let percent = DiscountPercent::new(15).unwrap();
        assert_eq!(Money::new(5000).apply_discount(percent), Money::new(4250));
    }

    #[test]
    fn discount_rounds_down() {
        let percent = DiscountPercent::new(33).unwrap();
        // 7500 * 67 / 100 = 5025, 99 * 67 / 100 = 66.33
        assert_eq!(Money::new(7500).apply_discount(percent), Money::new(5025));
        assert_eq!(Money::new(99).apply_discount(percent), Money::new(66));
    }

    #[test]
    fn percent_outside_range_is_rejected() {
        assert!(DiscountPercent::new(0).is_err());
        assert!(DiscountPercent::new(100).is_err());
        assert!(DiscountPercent::new(-5).is_err());
        assert_eq!(DiscountPercent::new(1).unwrap().get(), 1);
        assert_eq!(DiscountPercent::new(99).unwrap().get(), 99);
    }

    #[test]
    fn price_parsing() {
        assert_eq!(Money::parse(" 6000 ").unwrap(), Money::new(6000));
        assert_eq!(Money::parse("0").unwrap(), Money::ZERO);
        assert!(Money::parse("-1").is_err());
        assert!(Money::parse("12.5").is_err());
        assert!(Money::parse("abc").is_err());
        assert!(Money::parse("").is_err());
        assert!(Money::parse("99999999999").is_err());
    }

    #[test]
    fn generated_ticket_id_is_twelve_upper_hex() {
        let id = TicketId::generate();
        assert_eq!(id.as_str().len(), TicketId::LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn ticket_input_is_normalised() {
        assert_eq!(TicketId::from_input("  ab12cd34ef56 \n").unwrap().as_str(), "AB12CD34EF56");
        assert!(TicketId::from_input("   ").is_none());
    }

    #[test]
    fn reference_token_shape() {
        let token = ReferenceToken::generate();
        assert_eq!(token.as_str().len(), 8);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_eq!(ReferenceToken::parse("ab12cd34").unwrap().as_str(), "AB12CD34");
        assert!(ReferenceToken::parse("").is_none());
        assert!(ReferenceToken::parse("AB:12").is_none());
    }

    proptest! {
        #[test]
        fn discount_matches_floor_formula(price in 0u64..=Money::MAX.amount(), percent in 1i64..=99) {
            let percent_value = DiscountPercent::new(percent).unwrap();
            let expected = u128::from(price) * u128::try_from(100 - percent).unwrap() / 100;
            let discounted = Money::new(price).apply_discount(percent_value);
            prop_assert_eq!(u128::from(discounted.amount()), expected);
            prop_assert!(discounted <= Money::new(price));
        }
    }
}
