//! Menu item and variant models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Category;

/// A sellable dish or drink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Base unit price, used when no variant is chosen
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
    pub variants: Vec<MenuItemVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A size or style of a menu item with its own absolute price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemVariant {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_default: bool,
    pub sort_order: i32,
}

impl MenuItem {
    pub fn default_variant(&self) -> Option<&MenuItemVariant> {
        self.variants.iter().find(|v| v.is_default)
    }
}

/// Category with its available items, as shown on the POS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuSection {
    #[serde(flatten)]
    pub category: Category,
    pub items: Vec<MenuItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item_with_variants() -> MenuItem {
        let item_id = Uuid::new_v4();
        MenuItem {
            id: item_id,
            category_id: Uuid::new_v4(),
            name: "Latte".to_string(),
            description: None,
            price: Decimal::from_str("3.50").unwrap(),
            image_url: None,
            is_available: true,
            sort_order: 0,
            variants: vec![
                MenuItemVariant {
                    id: Uuid::new_v4(),
                    menu_item_id: item_id,
                    name: "Small".to_string(),
                    price: Decimal::from_str("3.00").unwrap(),
                    is_default: false,
                    sort_order: 0,
                },
                MenuItemVariant {
                    id: Uuid::new_v4(),
                    menu_item_id: item_id,
                    name: "Large".to_string(),
                    price: Decimal::from_str("4.25").unwrap(),
                    is_default: true,
                    sort_order: 1,
                },
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_variant() {
        let item = item_with_variants();
        assert_eq!(item.default_variant().map(|v| v.name.as_str()), Some("Large"));
    }
}
