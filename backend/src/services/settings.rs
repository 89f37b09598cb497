//! Restaurant settings

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::Settings;
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct SettingsService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    restaurant_name: String,
    currency: String,
    tax_rate: Decimal,
    receipt_footer: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            restaurant_name: row.restaurant_name,
            currency: row.currency.trim().to_string(),
            tax_rate: row.tax_rate,
            receipt_footer: row.receipt_footer,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsInput {
    #[validate(length(min = 1, max = 150, message = "Restaurant name must be 1-150 characters"))]
    pub restaurant_name: Option<String>,
    pub currency: Option<String>,
    pub tax_rate: Option<Decimal>,
    #[validate(length(max = 500, message = "Receipt footer is too long"))]
    pub receipt_footer: Option<String>,
}

impl SettingsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_settings(&self) -> AppResult<Settings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT restaurant_name, currency, tax_rate, receipt_footer, updated_at FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Internal("Settings row is missing".to_string()))?;

        Ok(row.into())
    }

    pub async fn update_settings(&self, input: UpdateSettingsInput) -> AppResult<Settings> {
        input.validate()?;

        if let Some(ref currency) = input.currency {
            shared::validate_currency(currency).map_err(|m| AppError::validation("currency", m))?;
        }
        if let Some(rate) = input.tax_rate {
            shared::validate_tax_rate(rate).map_err(|m| AppError::validation("tax_rate", m))?;
        }

        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            UPDATE settings SET
                restaurant_name = COALESCE($1, restaurant_name),
                currency = COALESCE($2, currency),
                tax_rate = COALESCE($3, tax_rate),
                receipt_footer = COALESCE($4, receipt_footer),
                updated_at = NOW()
            WHERE id = 1
            RETURNING restaurant_name, currency, tax_rate, receipt_footer, updated_at
            "#,
        )
        .bind(input.restaurant_name.as_deref().map(str::trim))
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(&input.receipt_footer)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("settings updated");

        Ok(row.into())
    }
}
