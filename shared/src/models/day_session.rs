//! Business day (shift) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DaySessionStatus {
    Open,
    Closed,
}

crate::string_enum!(DaySessionStatus, "day session status", {
    Open => "open",
    Closed => "closed",
});

/// A trading day. Orders can only be taken while a session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySession {
    pub id: Uuid,
    pub status: DaySessionStatus,
    pub opened_by: Uuid,
    pub opened_at: DateTime<Utc>,
    pub opening_cash: Decimal,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closing_cash: Option<Decimal>,
    pub notes: Option<String>,
}

/// Revenue attributed to one payment method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentBreakdown {
    pub method: PaymentMethod,
    pub order_count: i64,
    pub amount: Decimal,
}

/// Best sellers of the day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSales {
    pub item_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// End-of-day figures for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySummary {
    pub session_id: Uuid,
    pub order_count: i64,
    pub completed_count: i64,
    pub cancelled_count: i64,
    /// Sum of subtotals of paid orders
    pub gross_sales: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    /// Sum of totals of paid orders
    pub net_sales: Decimal,
    pub by_payment_method: Vec<PaymentBreakdown>,
    pub expected_cash: Decimal,
    pub cash_difference: Option<Decimal>,
    pub top_items: Vec<ItemSales>,
}

impl DaySummary {
    /// Cash that should be in the drawer: float plus cash takings
    pub fn expected_cash(opening_cash: Decimal, breakdown: &[PaymentBreakdown]) -> Decimal {
        opening_cash
            + breakdown
                .iter()
                .filter(|b| b.method == PaymentMethod::Cash)
                .map(|b| b.amount)
                .sum::<Decimal>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_cash_counts_only_cash() {
        let breakdown = vec![
            PaymentBreakdown {
                method: PaymentMethod::Cash,
                order_count: 3,
                amount: Decimal::new(4550, 2),
            },
            PaymentBreakdown {
                method: PaymentMethod::Card,
                order_count: 2,
                amount: Decimal::new(2000, 2),
            },
        ];
        assert_eq!(
            DaySummary::expected_cash(Decimal::new(10000, 2), &breakdown),
            Decimal::new(14550, 2)
        );
    }
}
