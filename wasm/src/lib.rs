//! WebAssembly module for the Restaurant Management Platform
//!
//! Lets the POS and KDS preview what the backend will compute:
//! - Order totals (subtotal, discount, tax)
//! - Change due on cash payments
//! - Which status moves are allowed from the current one

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{calculate_change, calculate_totals, Discount, LineInput, OrderStatus, OrderTotals};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("restaurant-wasm loaded"));
}

/// Cart as held by the POS
#[derive(Debug, Deserialize)]
struct CartInput {
    lines: Vec<LineInput>,
    #[serde(default)]
    discount: Discount,
    tax_rate: Decimal,
}

fn order_totals(cart_json: &str) -> Result<OrderTotals, String> {
    let cart: CartInput =
        serde_json::from_str(cart_json).map_err(|e| format!("Invalid cart JSON: {}", e))?;
    calculate_totals(&cart.lines, cart.discount, cart.tax_rate).map_err(|e| e.to_string())
}

fn change_due(total: &str, tendered: &str) -> Result<Decimal, String> {
    let total = Decimal::from_str(total).map_err(|e| format!("Invalid total: {}", e))?;
    let tendered = Decimal::from_str(tendered).map_err(|e| format!("Invalid amount: {}", e))?;
    calculate_change(total, tendered).map_err(|e| e.to_string())
}

fn parse_status(status: &str) -> Option<OrderStatus> {
    OrderStatus::from_str(status).ok()
}

fn next_statuses(from: &str) -> Vec<&'static str> {
    parse_status(from)
        .map(|s| s.next_statuses().iter().map(OrderStatus::as_str).collect())
        .unwrap_or_default()
}

/// Compute order totals from `{lines, discount?, tax_rate}`; returns JSON
#[wasm_bindgen]
pub fn calculate_order_totals(cart_json: &str) -> Result<String, JsValue> {
    let totals = order_totals(cart_json).map_err(|e| JsValue::from_str(&e))?;
    serde_json::to_string(&totals).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Change owed on a cash payment, as a decimal string
#[wasm_bindgen]
pub fn calculate_change_due(total: &str, tendered: &str) -> Result<String, JsValue> {
    change_due(total, tendered)
        .map(|c| c.to_string())
        .map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn can_transition_order(from: &str, to: &str) -> bool {
    match (parse_status(from), parse_status(to)) {
        (Some(from), Some(to)) => from.can_transition_to(to),
        _ => false,
    }
}

/// Statuses reachable from `from`, as a JS array of strings
#[wasm_bindgen]
pub fn next_order_statuses(from: &str) -> js_sys::Array {
    next_statuses(from)
        .into_iter()
        .map(JsValue::from_str)
        .collect()
}

/// Ticket label, e.g. `#007`
#[wasm_bindgen]
pub fn format_order_number(number: i32) -> String {
    format!("#{:03}", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_totals_from_cart() {
        let totals = order_totals(
            r#"{"lines":[{"unit_price":"4.50","quantity":2},{"unit_price":"3.00","quantity":1}],
                "discount":{"kind":"percent","value":"10"},
                "tax_rate":"7"}"#,
        )
        .unwrap();

        assert_eq!(totals.subtotal, Decimal::new(1200, 2));
        assert_eq!(totals.discount_amount, Decimal::new(120, 2));
        assert_eq!(totals.tax_amount, Decimal::new(76, 2));
        assert_eq!(totals.total, Decimal::new(1156, 2));
    }

    #[test]
    fn test_order_totals_rejects_bad_input() {
        assert!(order_totals("not json").is_err());
        assert!(order_totals(r#"{"lines":[],"tax_rate":"7"}"#).is_err());
    }

    #[test]
    fn test_change_due() {
        assert_eq!(change_due("11.56", "20").unwrap(), Decimal::new(844, 2));
        assert!(change_due("11.56", "10").is_err());
        assert!(change_due("abc", "10").is_err());
    }

    #[test]
    fn test_transitions() {
        assert!(can_transition_order("pending", "preparing"));
        assert!(!can_transition_order("completed", "pending"));
        assert!(!can_transition_order("pending", "bogus"));
        assert_eq!(next_statuses("ready"), vec!["served", "completed"]);
        assert!(next_statuses("cancelled").is_empty());
        assert!(next_statuses("bogus").is_empty());
    }

    #[test]
    fn test_format_order_number() {
        assert_eq!(format_order_number(7), "#007");
        assert_eq!(format_order_number(1234), "#1234");
    }
}
