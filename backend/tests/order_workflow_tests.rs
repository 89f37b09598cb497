//! Order workflow tests
//!
//! Tests for:
//! - Pricing orders against the menu (variants, availability)
//! - Status transitions per role
//! - Payment settlement and change
//! - Totals arithmetic invariants

use axum::http::StatusCode;
use chrono::Utc;
use proptest::prelude::*;
use restaurant_backend::error::AppError;
use restaurant_backend::services::order::{
    check_status_change, kitchen_statuses, parse_status_filter, resolve_line, settle_payment,
    OrderLineInput,
};
use rust_decimal::Decimal;
use shared::{
    calculate_totals, Discount, LineInput, MenuItem, MenuItemVariant, OrderStatus,
    PaymentMethod, PaymentStatus, PricingError, Role, MAX_QUANTITY,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn latte() -> MenuItem {
    let id = Uuid::new_v4();
    let variant = |name: &str, price: &str, is_default: bool, sort_order: i32| MenuItemVariant {
        id: Uuid::new_v4(),
        menu_item_id: id,
        name: name.to_string(),
        price: dec(price),
        is_default,
        sort_order,
    };

    MenuItem {
        id,
        category_id: Uuid::new_v4(),
        name: "Latte".to_string(),
        description: None,
        price: dec("4.00"),
        image_url: None,
        is_available: true,
        sort_order: 0,
        variants: vec![
            variant("Small", "3.50", false, 0),
            variant("Regular", "4.00", true, 1),
            variant("Large", "4.80", false, 2),
        ],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn croissant() -> MenuItem {
    MenuItem {
        id: Uuid::new_v4(),
        category_id: Uuid::new_v4(),
        name: "Croissant".to_string(),
        description: None,
        price: dec("2.75"),
        image_url: None,
        is_available: true,
        sort_order: 1,
        variants: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn line(item: &MenuItem, variant_id: Option<Uuid>, quantity: i32) -> OrderLineInput {
    OrderLineInput {
        menu_item_id: item.id,
        variant_id,
        quantity,
        notes: None,
    }
}

// ============================================================================
// Menu resolution
// ============================================================================

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn test_plain_item_uses_base_price() {
        let item = croissant();
        let resolved = resolve_line(&item, &line(&item, None, 3)).unwrap();

        assert_eq!(resolved.unit_price, dec("2.75"));
        assert_eq!(resolved.item_name, "Croissant");
        assert_eq!(resolved.variant_id, None);
        assert_eq!(resolved.quantity, 3);
    }

    #[test]
    fn test_requested_variant_price_is_snapshotted() {
        let item = latte();
        let large = item.variants[2].id;
        let resolved = resolve_line(&item, &line(&item, Some(large), 1)).unwrap();

        assert_eq!(resolved.unit_price, dec("4.80"));
        assert_eq!(resolved.variant_name.as_deref(), Some("Large"));
    }

    #[test]
    fn test_default_variant_when_none_requested() {
        let item = latte();
        let resolved = resolve_line(&item, &line(&item, None, 1)).unwrap();

        assert_eq!(resolved.variant_name.as_deref(), Some("Regular"));
        assert_eq!(resolved.unit_price, dec("4.00"));
    }

    #[test]
    fn test_variant_without_default_must_be_chosen() {
        let mut item = latte();
        for v in &mut item.variants {
            v.is_default = false;
        }
        let err = resolve_line(&item, &line(&item, None, 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_foreign_variant_is_rejected() {
        let item = latte();
        let err = resolve_line(&item, &line(&item, Some(Uuid::new_v4()), 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_unavailable_item_is_rejected() {
        let mut item = croissant();
        item.is_available = false;
        let err = resolve_line(&item, &line(&item, None, 1)).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn test_quantity_bounds() {
        let item = croissant();
        assert!(resolve_line(&item, &line(&item, None, 0)).is_err());
        assert!(resolve_line(&item, &line(&item, None, -2)).is_err());
        assert!(resolve_line(&item, &line(&item, None, MAX_QUANTITY)).is_ok());

        let err = resolve_line(&item, &line(&item, None, MAX_QUANTITY + 1)).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
        assert_eq!(err.status_and_detail().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_order_too_large_for_storage_is_a_bad_request() {
        let mut item = croissant();
        item.price = dec("9999999999.99");
        let resolved = resolve_line(&item, &line(&item, None, 2)).unwrap();

        let err = AppError::from(
            calculate_totals(&[resolved.pricing()], Discount::None, Decimal::ZERO).unwrap_err(),
        );
        assert!(matches!(err, AppError::Pricing(PricingError::AmountTooLarge)));
        assert_eq!(err.status_and_detail().0, StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Status transitions
// ============================================================================

#[cfg(test)]
mod status_tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_kitchen_drives_preparation() {
        assert!(check_status_change(Role::Kitchen, Pending, Preparing, PaymentStatus::Unpaid, None).is_ok());
        assert!(check_status_change(Role::Kitchen, Preparing, Ready, PaymentStatus::Unpaid, None).is_ok());
        assert!(matches!(
            check_status_change(Role::Kitchen, Ready, Served, PaymentStatus::Unpaid, None),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_cashier_drives_service() {
        assert!(check_status_change(Role::Cashier, Ready, Served, PaymentStatus::Unpaid, None).is_ok());
        assert!(check_status_change(Role::Cashier, Served, Completed, PaymentStatus::Paid, None).is_ok());
        assert!(matches!(
            check_status_change(Role::Cashier, Pending, Preparing, PaymentStatus::Unpaid, None),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_illegal_transition() {
        assert!(matches!(
            check_status_change(Role::Admin, Pending, Ready, PaymentStatus::Unpaid, None),
            Err(AppError::InvalidStateTransition(_))
        ));
        assert!(matches!(
            check_status_change(Role::Admin, Completed, Pending, PaymentStatus::Paid, None),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_cancel_requires_reason() {
        assert!(matches!(
            check_status_change(Role::Cashier, Pending, Cancelled, PaymentStatus::Unpaid, None),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            check_status_change(Role::Cashier, Pending, Cancelled, PaymentStatus::Unpaid, Some("   ")),
            Err(AppError::Validation { .. })
        ));
        assert!(check_status_change(
            Role::Cashier,
            Preparing,
            Cancelled,
            PaymentStatus::Unpaid,
            Some("customer left")
        )
        .is_ok());
    }

    #[test]
    fn test_paid_order_cannot_be_cancelled() {
        assert!(matches!(
            check_status_change(Role::Admin, Preparing, Cancelled, PaymentStatus::Paid, Some("oops")),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_kitchen_sees_only_open_tickets() {
        assert_eq!(kitchen_statuses(), vec!["pending", "preparing", "ready"]);
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!(
            parse_status_filter(Some("pending, ready")).unwrap(),
            vec![Pending, Ready]
        );
        assert!(parse_status_filter(None).unwrap().is_empty());
        assert!(parse_status_filter(Some("")).unwrap().is_empty());
        assert!(parse_status_filter(Some("pending,lost")).is_err());
    }
}

// ============================================================================
// Payments
// ============================================================================

#[cfg(test)]
mod payment_tests {
    use super::*;

    #[test]
    fn test_cash_payment_records_change() {
        let outcome = settle_payment(
            OrderStatus::Ready,
            PaymentStatus::Unpaid,
            dec("11.56"),
            PaymentMethod::Cash,
            Some(dec("20.00")),
        )
        .unwrap();

        assert_eq!(outcome.amount_tendered, dec("20.00"));
        assert_eq!(outcome.change_due, dec("8.44"));
        assert_eq!(outcome.new_status, OrderStatus::Ready);
    }

    #[test]
    fn test_cash_requires_enough_tender() {
        let err = settle_payment(
            OrderStatus::Pending,
            PaymentStatus::Unpaid,
            dec("11.56"),
            PaymentMethod::Cash,
            Some(dec("10.00")),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Pricing(_)));

        let err = settle_payment(
            OrderStatus::Pending,
            PaymentStatus::Unpaid,
            dec("11.56"),
            PaymentMethod::Cash,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_card_charges_exact_total() {
        let outcome = settle_payment(
            OrderStatus::Preparing,
            PaymentStatus::Unpaid,
            dec("9.99"),
            PaymentMethod::Card,
            Some(dec("50")),
        )
        .unwrap();

        assert_eq!(outcome.amount_tendered, dec("9.99"));
        assert_eq!(outcome.change_due, Decimal::ZERO);
    }

    #[test]
    fn test_paying_served_order_completes_it() {
        let outcome = settle_payment(
            OrderStatus::Served,
            PaymentStatus::Unpaid,
            dec("5.00"),
            PaymentMethod::Mobile,
            None,
        )
        .unwrap();
        assert_eq!(outcome.new_status, OrderStatus::Completed);
    }

    #[test]
    fn test_cannot_pay_twice_or_cancelled() {
        assert!(matches!(
            settle_payment(OrderStatus::Ready, PaymentStatus::Paid, dec("5"), PaymentMethod::Card, None),
            Err(AppError::Conflict { .. })
        ));
        assert!(matches!(
            settle_payment(OrderStatus::Cancelled, PaymentStatus::Unpaid, dec("5"), PaymentMethod::Card, None),
            Err(AppError::BusinessRule(_))
        ));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn line_strategy() -> impl Strategy<Value = LineInput> {
    (0i64..50_000, 1i32..20).prop_map(|(cents, quantity)| LineInput {
        unit_price: Decimal::new(cents, 2),
        quantity,
    })
}

fn discount_strategy() -> impl Strategy<Value = Discount> {
    prop_oneof![
        Just(Discount::None),
        (0i64..100_000).prop_map(|c| Discount::Amount(Decimal::new(c, 2))),
        (0i64..=10_000).prop_map(|bp| Discount::Percent(Decimal::new(bp, 2))),
    ]
}

proptest! {
    /// total = subtotal - discount + tax, all in whole cents
    #[test]
    fn prop_totals_add_up(
        lines in prop::collection::vec(line_strategy(), 1..10),
        discount in discount_strategy(),
        tax_bp in 0i64..=3000,
    ) {
        let tax_rate = Decimal::new(tax_bp, 2);
        let totals = calculate_totals(&lines, discount, tax_rate).unwrap();

        prop_assert_eq!(totals.total, totals.subtotal - totals.discount_amount + totals.tax_amount);
        prop_assert!(totals.discount_amount <= totals.subtotal);
        prop_assert!(totals.total >= Decimal::ZERO);
        for amount in [totals.subtotal, totals.discount_amount, totals.tax_amount, totals.total] {
            prop_assert!(amount.normalize().scale() <= 2);
        }
    }

    /// Cash change never goes negative and returns tender minus total
    #[test]
    fn prop_cash_change(total_cents in 0i64..100_000, extra_cents in 0i64..100_000) {
        let total = Decimal::new(total_cents, 2);
        let tendered = Decimal::new(total_cents + extra_cents, 2);
        let outcome = settle_payment(
            OrderStatus::Pending,
            PaymentStatus::Unpaid,
            total,
            PaymentMethod::Cash,
            Some(tendered),
        )
        .unwrap();

        prop_assert_eq!(outcome.change_due, Decimal::new(extra_cents, 2));
    }
}
