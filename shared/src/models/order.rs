//! Order, order item and payment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle as seen by POS and KDS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Completed,
    Cancelled,
}

crate::string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Preparing => "preparing",
    Ready => "ready",
    Served => "served",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Statuses reachable in one step from `self`
    pub fn next_statuses(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;

        match self {
            Pending => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Served, Completed],
            Served => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.next_statuses().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses shown on the kitchen display
    pub fn is_kitchen_visible(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
        )
    }
}

/// How the order is fulfilled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

crate::string_enum!(OrderType, "order type", {
    DineIn => "dine_in",
    Takeaway => "takeaway",
    Delivery => "delivery",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

crate::string_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Card => "card",
    Mobile => "mobile",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

crate::string_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Paid => "paid",
    Refunded => "refunded",
});

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Sequence number within the day session, printed on tickets
    pub order_number: i32,
    pub day_session_id: Uuid,
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_tendered: Option<Decimal>,
    pub change_due: Option<Decimal>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: Uuid,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A line on an order. Names and prices are snapshots taken when the
/// order was placed, so later menu edits do not alter past orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub item_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Served));
        assert!(Served.can_transition_to(Completed));
        assert!(Ready.can_transition_to(Completed));
    }

    #[test]
    fn test_rejected_transitions() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Preparing));
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.next_statuses().is_empty());
        }
    }

    #[test]
    fn test_kitchen_visibility() {
        assert!(OrderStatus::Pending.is_kitchen_visible());
        assert!(OrderStatus::Ready.is_kitchen_visible());
        assert!(!OrderStatus::Served.is_kitchen_visible());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderType::DineIn).unwrap();
        assert_eq!(json, "\"dine_in\"");
        let parsed: PaymentMethod = serde_json::from_str("\"mobile\"").unwrap();
        assert_eq!(parsed, PaymentMethod::Mobile);
    }
}
