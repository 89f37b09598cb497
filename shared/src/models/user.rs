//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::OrderStatus;

/// A staff account on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff role. Each front-end is operated by one role:
/// admin dashboard, POS (cashier) and KDS (kitchen).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
    Kitchen,
}

crate::string_enum!(Role, "role", {
    Admin => "admin",
    Cashier => "cashier",
    Kitchen => "kitchen",
});

/// Actions guarded by role checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewMenu,
    ManageMenu,
    ToggleAvailability,
    ManageUsers,
    ManageSettings,
    ViewOrders,
    CreateOrder,
    EditOrder,
    CancelOrder,
    TakePayment,
    RefundPayment,
    ManageDay,
    ViewReports,
    Chat,
}

crate::string_enum!(Permission, "permission", {
    ViewMenu => "view_menu",
    ManageMenu => "manage_menu",
    ToggleAvailability => "toggle_availability",
    ManageUsers => "manage_users",
    ManageSettings => "manage_settings",
    ViewOrders => "view_orders",
    CreateOrder => "create_order",
    EditOrder => "edit_order",
    CancelOrder => "cancel_order",
    TakePayment => "take_payment",
    RefundPayment => "refund_payment",
    ManageDay => "manage_day",
    ViewReports => "view_reports",
    Chat => "chat",
});

impl Role {
    /// Whether this role may perform the given action
    pub fn can(&self, permission: Permission) -> bool {
        use Permission::*;

        match self {
            Role::Admin => true,
            Role::Cashier => matches!(
                permission,
                ViewMenu
                    | ViewOrders
                    | CreateOrder
                    | EditOrder
                    | CancelOrder
                    | TakePayment
                    | ManageDay
                    | ViewReports
                    | Chat
            ),
            Role::Kitchen => matches!(
                permission,
                ViewMenu | ToggleAvailability | ViewOrders | Chat
            ),
        }
    }

    /// Whether this role may move an order into `target`.
    ///
    /// The kitchen drives preparation, front-of-house drives service and
    /// settlement. Transition legality itself is checked by [`OrderStatus`].
    pub fn can_set_order_status(&self, target: OrderStatus) -> bool {
        match self {
            Role::Admin => true,
            Role::Kitchen => matches!(target, OrderStatus::Preparing | OrderStatus::Ready),
            Role::Cashier => matches!(
                target,
                OrderStatus::Served | OrderStatus::Completed | OrderStatus::Cancelled
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_can_everything() {
        for p in [
            Permission::ManageUsers,
            Permission::ManageSettings,
            Permission::RefundPayment,
            Permission::ManageMenu,
        ] {
            assert!(Role::Admin.can(p));
        }
    }

    #[test]
    fn test_kitchen_is_limited() {
        assert!(Role::Kitchen.can(Permission::ToggleAvailability));
        assert!(Role::Kitchen.can(Permission::Chat));
        assert!(!Role::Kitchen.can(Permission::TakePayment));
        assert!(!Role::Kitchen.can(Permission::CreateOrder));
        assert!(!Role::Kitchen.can(Permission::ManageDay));
    }

    #[test]
    fn test_order_status_ownership() {
        assert!(Role::Kitchen.can_set_order_status(OrderStatus::Preparing));
        assert!(Role::Kitchen.can_set_order_status(OrderStatus::Ready));
        assert!(!Role::Kitchen.can_set_order_status(OrderStatus::Cancelled));
        assert!(Role::Cashier.can_set_order_status(OrderStatus::Served));
        assert!(!Role::Cashier.can_set_order_status(OrderStatus::Preparing));
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("waiter".parse::<Role>().is_err());
    }
}
