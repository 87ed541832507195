//! Free-text input rules shared by the buyer and administrator flows.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::DeskError;
use crate::types::DiscountPercent;

/// Minimal `local@domain.tld` shape.
static EMAIL_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").ok());

/// `CODE PERCENT`, case-insensitive, percent with one or two digits.
static DISCOUNT_ENTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*([A-Z0-9]+)\s+(\d{1,2})\s*$").ok());

/// Minimum buyer name length, counted in characters after trimming
pub const MIN_NAME_CHARS: usize = 3;

/// Why a piece of free text was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Name shorter than [`MIN_NAME_CHARS`]
    #[error("name too short")]
    NameTooShort,

    /// Text does not look like an email address
    #[error("malformed email")]
    MalformedEmail,

    /// Text is not `CODE PERCENT`
    #[error("malformed discount code entry")]
    MalformedDiscountEntry,

    /// Percentage outside 1..=99
    #[error("discount percent out of range")]
    PercentOutOfRange,
}

impl From<InputError> for DeskError {
    fn from(error: InputError) -> Self {
        Self::Validation(error.to_string())
    }
}

/// A parsed `CODE PERCENT` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountEntry {
    /// Upper-cased code
    pub code: String,
    /// Validated percentage
    pub percent: DiscountPercent,
}

/// Trims a buyer name and checks its length.
///
/// # Errors
///
/// [`InputError::NameTooShort`] when fewer than three characters remain.
pub fn buyer_name(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    if trimmed.chars().count() < MIN_NAME_CHARS {
        return Err(InputError::NameTooShort);
    }
    Ok(trimmed.to_owned())
}

/// Trims an email address and checks its shape.
///
/// # Errors
///
/// [`InputError::MalformedEmail`] when it does not look like `local@domain.tld`.
pub fn email(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    let matches = EMAIL_SHAPE
        .as_ref()
        .is_some_and(|shape| shape.is_match(trimmed));
    if !matches {
        return Err(InputError::MalformedEmail);
    }
    Ok(trimmed.to_owned())
}

/// Parses an administrator's new discount code entry.
///
/// # Errors
///
/// [`InputError::MalformedDiscountEntry`] for text not shaped like `CODE PERCENT`,
/// [`InputError::PercentOutOfRange`] for percentages such as `0` or `00`.
pub fn discount_entry(input: &str) -> Result<DiscountEntry, InputError> {
    let captures = DISCOUNT_ENTRY
        .as_ref()
        .and_then(|pattern| pattern.captures(input))
        .ok_or(InputError::MalformedDiscountEntry)?;

    let code = captures
        .get(1)
        .map(|m| m.as_str().to_uppercase())
        .ok_or(InputError::MalformedDiscountEntry)?;
    let percent = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(InputError::MalformedDiscountEntry)?;
    let percent = DiscountPercent::new(percent).map_err(|_| InputError::PercentOutOfRange)?;

    Ok(DiscountEntry { code, percent })
}

/// Normalises a code typed by a buyer before lookup.
#[must_use]
pub fn discount_code(input: &str) -> String {
    input.trim().to_uppercase()
}
