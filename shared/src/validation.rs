//! Validation utilities for roastery inputs
//!
//! String lengths and e-mail formats are checked by `validator` derives on the
//! backend input types; the helpers here cover codes, phone numbers and the
//! decimal quantities `validator` cannot range-check.

use rust_decimal::Decimal;

// ============================================================================
// Quantity and Money Validations
// ============================================================================

/// Largest weight a NUMERIC(12,3) column holds, 999 999 999.999 kg
pub const MAX_WEIGHT_KG: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 3);

/// Largest amount a NUMERIC(12,2) column holds, 9 999 999 999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Validate a weight in kilograms is strictly positive
pub fn validate_weight_kg(kg: Decimal) -> Result<(), &'static str> {
    if kg <= Decimal::ZERO {
        return Err("Weight must be greater than zero");
    }
    if kg > MAX_WEIGHT_KG {
        return Err("Weight is too large");
    }
    if kg.normalize().scale() > 3 {
        return Err("Weight supports at most three decimal places (grams)");
    }
    Ok(())
}

/// Validate a money amount is zero or more with at most two decimals
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount > MAX_AMOUNT {
        return Err("Amount is too large");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount supports at most two decimal places");
    }
    Ok(())
}

/// Validate a money amount is strictly positive
pub fn validate_positive_amount(amount: Decimal) -> Result<(), &'static str> {
    validate_amount(amount)?;
    if amount.is_zero() {
        return Err("Amount must be greater than zero");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a business code (batch, micro-batch, catalog).
///
/// Codes become part of generated SKUs, so they are limited to ASCII letters,
/// digits, `-` and `_`.
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() || code.len() > 50 {
        return Err("Code must be between 1 and 50 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Code may only contain letters, digits, '-' and '_'");
    }
    Ok(())
}

/// Validate a phone number: digits with optional `+`, spaces and dashes
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(6..=15).contains(&digits) {
        return Err("Phone number must contain between 6 and 15 digits");
    }
    if !phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (c == '+' && i == 0))
    {
        return Err("Phone number contains invalid characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_weight_kg() {
        assert!(validate_weight_kg(dec("12.345")).is_ok());
        assert!(validate_weight_kg(dec("0")).is_err());
        assert!(validate_weight_kg(dec("-1")).is_err());
        assert!(validate_weight_kg(dec("1.2345")).is_err());
        assert!(validate_weight_kg(dec("999999999.999")).is_ok());
        assert_eq!(validate_weight_kg(dec("1000000000")), Err("Weight is too large"));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec("0")).is_ok());
        assert!(validate_amount(dec("10.50")).is_ok());
        assert!(validate_amount(dec("10.500")).is_ok());
        assert!(validate_amount(dec("10.505")).is_err());
        assert!(validate_amount(dec("-0.01")).is_err());
        assert!(validate_positive_amount(dec("0")).is_err());
        assert!(validate_positive_amount(dec("0.01")).is_ok());
        assert!(validate_amount(dec("9999999999.99")).is_ok());
        assert_eq!(validate_amount(dec("10000000000")), Err("Amount is too large"));
        assert!(validate_positive_amount(dec("10000000000")).is_err());
    }

    #[test]
    fn test_limits_match_column_precision() {
        assert_eq!(MAX_WEIGHT_KG, dec("999999999.999"));
        assert_eq!(MAX_AMOUNT, dec("9999999999.99"));
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("LOT-2024_01").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("LOT 1").is_err());
        assert!(validate_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+51 987-654-321").is_ok());
        assert!(validate_phone("987654321").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("98765+4321").is_err());
        assert!(validate_phone("phone 987654").is_err());
    }
}
