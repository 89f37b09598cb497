//! Menu item management and the POS menu view

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{MenuItem, MenuItemVariant, MenuSection};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::category::CategoryService;

/// Menu service for items and their variants
#[derive(Clone)]
pub struct MenuService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct MenuItemRow {
    id: Uuid,
    category_id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    image_url: Option<String>,
    is_available: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct VariantRow {
    id: Uuid,
    menu_item_id: Uuid,
    name: String,
    price: Decimal,
    is_default: bool,
    sort_order: i32,
}

impl From<VariantRow> for MenuItemVariant {
    fn from(row: VariantRow) -> Self {
        MenuItemVariant {
            id: row.id,
            menu_item_id: row.menu_item_id,
            name: row.name,
            price: row.price,
            is_default: row.is_default,
            sort_order: row.sort_order,
        }
    }
}

impl MenuItemRow {
    fn into_item(self, variants: Vec<MenuItemVariant>) -> MenuItem {
        MenuItem {
            id: self.id,
            category_id: self.category_id,
            name: self.name,
            description: self.description,
            price: self.price,
            image_url: self.image_url,
            is_available: self.is_available,
            sort_order: self.sort_order,
            variants,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ITEM_COLUMNS: &str = "id, category_id, name, description, price, image_url, is_available, sort_order, created_at, updated_at";

/// Variant as submitted by the admin dashboard
#[derive(Debug, Clone, Deserialize)]
pub struct VariantInput {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuItemInput {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 150, message = "Item name must be 1-150 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(url(message = "Image URL is invalid"))]
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuItemInput {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 150, message = "Item name must be 1-150 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(url(message = "Image URL is invalid"))]
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
    pub sort_order: Option<i32>,
    /// When present, replaces the full variant list
    pub variants: Option<Vec<VariantInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuItemFilter {
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub available_only: bool,
}

/// Check a variant list before it is written
pub fn validate_variants(variants: &[VariantInput]) -> AppResult<()> {
    let mut names = HashSet::new();
    let mut defaults = 0;

    for variant in variants {
        let name = variant.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("variants", "Variant name cannot be empty"));
        }
        if !names.insert(name.to_lowercase()) {
            return Err(AppError::validation(
                "variants",
                format!("Duplicate variant name '{}'", name),
            ));
        }
        shared::validate_price(variant.price).map_err(|m| AppError::validation("variants", m))?;
        if variant.is_default {
            defaults += 1;
        }
    }

    if defaults > 1 {
        return Err(AppError::validation(
            "variants",
            "Only one variant can be the default",
        ));
    }
    Ok(())
}

impl MenuService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_items(&self, filter: MenuItemFilter) -> AppResult<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM menu_items
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR category_id = $1)
              AND (is_available OR NOT $2)
            ORDER BY sort_order ASC, name ASC
            "#
        ))
        .bind(filter.category_id)
        .bind(filter.available_only)
        .fetch_all(&self.db)
        .await?;

        self.attach_variants(rows).await
    }

    pub async fn get_item(&self, item_id: Uuid) -> AppResult<MenuItem> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Menu item"))?;

        let mut items = self.attach_variants(vec![row]).await?;
        items.pop().ok_or_else(|| AppError::not_found("Menu item"))
    }

    /// Fetch several items at once, keyed by id. Deleted items are omitted.
    pub async fn get_items_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(self
            .attach_variants(rows)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect())
    }

    pub async fn create_item(&self, input: CreateMenuItemInput) -> AppResult<MenuItem> {
        input.validate()?;
        shared::validate_price(input.price).map_err(|m| AppError::validation("price", m))?;
        validate_variants(&input.variants)?;
        self.ensure_category(input.category_id).await?;

        let mut tx = self.db.begin().await?;

        let item_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO menu_items (category_id, name, description, price, image_url, is_available, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(input.is_available.unwrap_or(true))
        .bind(input.sort_order.unwrap_or(0))
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_variants(&mut tx, item_id, &input.variants).await?;

        tx.commit().await?;

        tracing::info!(%item_id, "menu item created");

        self.get_item(item_id).await
    }

    pub async fn update_item(&self, item_id: Uuid, input: UpdateMenuItemInput) -> AppResult<MenuItem> {
        input.validate()?;
        self.get_item(item_id).await?;

        if let Some(price) = input.price {
            shared::validate_price(price).map_err(|m| AppError::validation("price", m))?;
        }
        if let Some(ref variants) = input.variants {
            validate_variants(variants)?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE menu_items SET
                category_id = COALESCE($2, category_id),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                image_url = COALESCE($6, image_url),
                is_available = COALESCE($7, is_available),
                sort_order = COALESCE($8, sort_order),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(input.category_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(input.is_available)
        .bind(input.sort_order)
        .execute(&mut *tx)
        .await?;

        if let Some(ref variants) = input.variants {
            // Past order lines keep pointing at the retired variants
            sqlx::query(
                "UPDATE menu_item_variants SET deleted_at = NOW() WHERE menu_item_id = $1 AND deleted_at IS NULL",
            )
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

            Self::insert_variants(&mut tx, item_id, variants).await?;
        }

        tx.commit().await?;

        self.get_item(item_id).await
    }

    /// Mark an item as sold out or back in stock
    pub async fn set_availability(&self, item_id: Uuid, is_available: bool) -> AppResult<MenuItem> {
        let result = sqlx::query(
            "UPDATE menu_items SET is_available = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .bind(is_available)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Menu item"));
        }

        tracing::info!(%item_id, is_available, "menu item availability changed");

        self.get_item(item_id).await
    }

    pub async fn delete_item(&self, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE menu_items SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Menu item"));
        }
        Ok(())
    }

    /// Active categories with their available items, as shown on the POS
    pub async fn pos_menu(&self) -> AppResult<Vec<MenuSection>> {
        let categories = CategoryService::new(self.db.clone())
            .list_categories(false)
            .await?;
        let items = self
            .list_items(MenuItemFilter {
                category_id: None,
                available_only: true,
            })
            .await?;

        let mut by_category: HashMap<Uuid, Vec<MenuItem>> = HashMap::new();
        for item in items {
            by_category.entry(item.category_id).or_default().push(item);
        }

        Ok(categories
            .into_iter()
            .map(|category| {
                let items = by_category.remove(&category.id).unwrap_or_default();
                MenuSection { category, items }
            })
            .filter(|section| !section.items.is_empty())
            .collect())
    }

    async fn ensure_category(&self, category_id: Uuid) -> AppResult<()> {
        CategoryService::new(self.db.clone())
            .get_category(category_id)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::validation("category_id", "Category does not exist"),
                other => other,
            })
    }

    async fn insert_variants(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
        variants: &[VariantInput],
    ) -> AppResult<()> {
        for (position, variant) in variants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO menu_item_variants (menu_item_id, name, price, is_default, sort_order)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item_id)
            .bind(variant.name.trim())
            .bind(variant.price)
            .bind(variant.is_default)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn attach_variants(&self, rows: Vec<MenuItemRow>) -> AppResult<Vec<MenuItem>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let variants = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, menu_item_id, name, price, is_default, sort_order
            FROM menu_item_variants
            WHERE menu_item_id = ANY($1) AND deleted_at IS NULL
            ORDER BY sort_order ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<MenuItemVariant>> = HashMap::new();
        for variant in variants {
            grouped
                .entry(variant.menu_item_id)
                .or_default()
                .push(variant.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let variants = grouped.remove(&row.id).unwrap_or_default();
                row.into_item(variants)
            })
            .collect())
    }
}
