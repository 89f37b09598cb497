//! Validation utilities for the Restaurant Management Platform

use rust_decimal::Decimal;

use crate::pricing::MAX_AMOUNT;

pub const MAX_MESSAGE_LENGTH: usize = 2000;

// ============================================================================
// Account Validations
// ============================================================================

/// Validate username: 3-32 chars of lowercase letters, digits, `_` or `.`
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 || username.len() > 32 {
        return Err("Username must be between 3 and 32 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err("Username may only contain lowercase letters, digits, '_' and '.'");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

// ============================================================================
// Menu and Money Validations
// ============================================================================

/// Prices are non-negative and expressed in whole cents
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if price > MAX_AMOUNT {
        return Err("Price cannot exceed 9999999999.99");
    }
    if price.normalize().scale() > 2 {
        return Err("Price cannot have more than 2 decimal places");
    }
    Ok(())
}

pub fn validate_tax_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err("Tax rate must be between 0 and 100");
    }
    Ok(())
}

/// ISO 4217 style currency code
pub fn validate_currency(code: &str) -> Result<(), &'static str> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err("Currency must be a 3-letter uppercase code")
    }
}

// ============================================================================
// Order and Chat Validations
// ============================================================================

pub fn validate_table_number(table: &str) -> Result<(), &'static str> {
    let trimmed = table.trim();
    if trimmed.is_empty() {
        return Err("Table number cannot be empty");
    }
    if trimmed.len() > 16 {
        return Err("Table number is too long");
    }
    Ok(())
}

pub fn validate_message_body(body: &str) -> Result<(), &'static str> {
    if body.trim().is_empty() {
        return Err("Message cannot be empty");
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err("Message is too long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_usernames() {
        assert!(validate_username("anna").is_ok());
        assert!(validate_username("pos.terminal_2").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("Anna").is_err());
        assert!(validate_username("a b c").is_err());
    }

    #[test]
    fn test_prices() {
        assert!(validate_price(Decimal::from_str("9.99").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("10.500").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("0.001").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("9999999999.99").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("10000000000").unwrap()).is_err());
    }

    #[test]
    fn test_currency() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn test_message_body() {
        assert!(validate_message_body("Table 4 allergy: nuts").is_ok());
        assert!(validate_message_body("   ").is_err());
        assert!(validate_message_body(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_table_number() {
        assert!(validate_table_number("12").is_ok());
        assert!(validate_table_number(" ").is_err());
    }
}
