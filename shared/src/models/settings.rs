//! Restaurant-wide settings

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub restaurant_name: String,
    /// ISO 4217 code
    pub currency: String,
    /// Percentage applied to the discounted subtotal
    pub tax_rate: Decimal,
    pub receipt_footer: Option<String>,
    pub updated_at: DateTime<Utc>,
}
