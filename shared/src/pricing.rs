//! Order totals arithmetic
//!
//! Used by the backend when an order is placed or edited, and by the POS
//! (through WASM) to preview totals before submitting.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest amount a NUMERIC(12,2) money column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Upper bound on a single line's quantity
pub const MAX_QUANTITY: i32 = 999;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("quantity must be between 1 and 999 (line {line})")]
    InvalidQuantity { line: usize },

    #[error("unit price cannot be negative (line {line})")]
    NegativePrice { line: usize },

    #[error("discount cannot be negative")]
    NegativeDiscount,

    #[error("discount percentage must be between 0 and 100")]
    DiscountPercentOutOfRange,

    #[error("tax rate must be between 0 and 100")]
    TaxRateOutOfRange,

    #[error("amount tendered is less than the total")]
    InsufficientTender,

    #[error("amount exceeds the largest supported value")]
    AmountTooLarge,
}

/// One priced line
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineInput {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Order-level discount as entered at the till
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    Amount(Decimal),
    Percent(Decimal),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Round a monetary amount to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject amounts a money column cannot store
pub fn check_amount(amount: Decimal) -> Result<Decimal, PricingError> {
    if amount > MAX_AMOUNT {
        return Err(PricingError::AmountTooLarge);
    }
    Ok(amount)
}

pub fn line_total(line: &LineInput) -> Result<Decimal, PricingError> {
    let total = line
        .unit_price
        .checked_mul(Decimal::from(line.quantity))
        .ok_or(PricingError::AmountTooLarge)?;
    check_amount(round_money(total))
}

/// Compute subtotal, discount, tax and total for a set of lines
pub fn calculate_totals(
    lines: &[LineInput],
    discount: Discount,
    tax_rate: Decimal,
) -> Result<OrderTotals, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyOrder);
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(PricingError::TaxRateOutOfRange);
    }

    let mut subtotal = Decimal::ZERO;
    for (idx, line) in lines.iter().enumerate() {
        if line.quantity <= 0 || line.quantity > MAX_QUANTITY {
            return Err(PricingError::InvalidQuantity { line: idx });
        }
        if line.unit_price < Decimal::ZERO {
            return Err(PricingError::NegativePrice { line: idx });
        }
        check_amount(line.unit_price)?;
        subtotal = subtotal
            .checked_add(line_total(line)?)
            .ok_or(PricingError::AmountTooLarge)?;
    }
    check_amount(subtotal)?;

    let discount_amount = match discount {
        Discount::None => Decimal::ZERO,
        Discount::Amount(amount) => {
            if amount < Decimal::ZERO {
                return Err(PricingError::NegativeDiscount);
            }
            round_money(amount.min(subtotal))
        }
        Discount::Percent(pct) => {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(PricingError::DiscountPercentOutOfRange);
            }
            round_money(subtotal * pct / Decimal::ONE_HUNDRED)
        }
    };

    let taxable = subtotal - discount_amount;
    let tax_amount = round_money(taxable * tax_rate / Decimal::ONE_HUNDRED);

    Ok(OrderTotals {
        subtotal,
        discount_amount,
        tax_rate,
        tax_amount,
        total: check_amount(taxable + tax_amount)?,
    })
}

/// Change owed for a cash payment
pub fn calculate_change(total: Decimal, tendered: Decimal) -> Result<Decimal, PricingError> {
    if tendered < total {
        return Err(PricingError::InsufficientTender);
    }
    check_amount(tendered)?;
    Ok(round_money(tendered - total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(price: &str, qty: i32) -> LineInput {
        LineInput {
            unit_price: dec(price),
            quantity: qty,
        }
    }

    #[test]
    fn test_basic_totals() {
        let totals = calculate_totals(
            &[line("12.50", 2), line("3.00", 1)],
            Discount::None,
            dec("10"),
        )
        .unwrap();

        assert_eq!(totals.subtotal, dec("28.00"));
        assert_eq!(totals.discount_amount, dec("0"));
        assert_eq!(totals.tax_amount, dec("2.80"));
        assert_eq!(totals.total, dec("30.80"));
    }

    #[test]
    fn test_percent_discount_applies_before_tax() {
        let totals =
            calculate_totals(&[line("20.00", 1)], Discount::Percent(dec("25")), dec("8")).unwrap();

        assert_eq!(totals.discount_amount, dec("5.00"));
        assert_eq!(totals.tax_amount, dec("1.20"));
        assert_eq!(totals.total, dec("16.20"));
    }

    #[test]
    fn test_amount_discount_is_capped_at_subtotal() {
        let totals =
            calculate_totals(&[line("4.00", 1)], Discount::Amount(dec("10")), dec("7")).unwrap();

        assert_eq!(totals.discount_amount, dec("4.00"));
        assert_eq!(totals.tax_amount, dec("0"));
        assert_eq!(totals.total, dec("0"));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.05 * 10% = 0.005 -> 0.01
        let totals = calculate_totals(&[line("0.05", 1)], Discount::None, dec("10")).unwrap();
        assert_eq!(totals.tax_amount, dec("0.01"));
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            calculate_totals(&[], Discount::None, dec("0")),
            Err(PricingError::EmptyOrder)
        );
        assert_eq!(
            calculate_totals(&[line("1", 0)], Discount::None, dec("0")),
            Err(PricingError::InvalidQuantity { line: 0 })
        );
        assert_eq!(
            calculate_totals(&[line("-1", 1)], Discount::None, dec("0")),
            Err(PricingError::NegativePrice { line: 0 })
        );
        assert_eq!(
            calculate_totals(&[line("1", 1)], Discount::Percent(dec("101")), dec("0")),
            Err(PricingError::DiscountPercentOutOfRange)
        );
        assert_eq!(
            calculate_totals(&[line("1", 1)], Discount::Amount(dec("-1")), dec("0")),
            Err(PricingError::NegativeDiscount)
        );
        assert_eq!(
            calculate_totals(&[line("1", 1)], Discount::None, dec("120")),
            Err(PricingError::TaxRateOutOfRange)
        );
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let huge = LineInput {
            unit_price: Decimal::MAX,
            quantity: 2,
        };
        assert_eq!(
            calculate_totals(&[huge], Discount::None, Decimal::ZERO),
            Err(PricingError::AmountTooLarge)
        );
        assert_eq!(line_total(&huge), Err(PricingError::AmountTooLarge));

        // Each line fits but the sum does not
        let big = line("9999999999.99", 1);
        assert_eq!(
            calculate_totals(&[big, big], Discount::None, Decimal::ZERO),
            Err(PricingError::AmountTooLarge)
        );

        // Tax pushes the total over the column limit
        assert_eq!(
            calculate_totals(&[big], Discount::None, dec("10")),
            Err(PricingError::AmountTooLarge)
        );

        let at_limit = calculate_totals(&[big], Discount::None, Decimal::ZERO).unwrap();
        assert_eq!(at_limit.total, MAX_AMOUNT);
    }

    #[test]
    fn test_quantity_limit() {
        assert!(calculate_totals(&[line("1", MAX_QUANTITY)], Discount::None, dec("0")).is_ok());
        assert_eq!(
            calculate_totals(&[line("1", MAX_QUANTITY + 1)], Discount::None, dec("0")),
            Err(PricingError::InvalidQuantity { line: 0 })
        );
    }

    #[test]
    fn test_change() {
        assert_eq!(calculate_change(dec("17.35"), dec("20")), Ok(dec("2.65")));
        assert_eq!(
            calculate_change(dec("17.35"), dec("17")),
            Err(PricingError::InsufficientTender)
        );
        assert_eq!(
            calculate_change(dec("1"), Decimal::MAX),
            Err(PricingError::AmountTooLarge)
        );
    }

    #[test]
    fn test_discount_serde_shape() {
        let d: Discount = serde_json::from_str(r#"{"kind":"percent","value":"15"}"#).unwrap();
        assert_eq!(d, Discount::Percent(dec("15")));
        let none: Discount = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, Discount::None);
    }

    proptest! {
        #[test]
        fn prop_total_is_discounted_subtotal_plus_tax(
            cents in prop::collection::vec((1i64..100_000, 1i32..20), 1..10),
            pct in 0u32..=100,
            tax in 0u32..=30,
        ) {
            let lines: Vec<LineInput> = cents
                .iter()
                .map(|(c, q)| LineInput { unit_price: Decimal::new(*c, 2), quantity: *q })
                .collect();
            let totals = calculate_totals(
                &lines,
                Discount::Percent(Decimal::from(pct)),
                Decimal::from(tax),
            ).unwrap();

            prop_assert!(totals.discount_amount <= totals.subtotal);
            prop_assert!(totals.total >= Decimal::ZERO);
            prop_assert_eq!(
                totals.total,
                totals.subtotal - totals.discount_amount + totals.tax_amount
            );
            prop_assert!(totals.total.scale() <= 2);
        }
    }
}
