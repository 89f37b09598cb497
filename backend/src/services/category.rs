//! Menu category management

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::Category;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Category service
#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            sort_order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1-100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// New display order, first id first
#[derive(Debug, Deserialize)]
pub struct ReorderCategoriesInput {
    pub ids: Vec<Uuid>,
}

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_categories(&self, include_inactive: bool) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, description, sort_order, is_active, created_at, updated_at
            FROM categories
            WHERE deleted_at IS NULL AND (is_active OR $1)
            ORDER BY sort_order ASC, name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn get_category(&self, category_id: Uuid) -> AppResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, description, sort_order, is_active, created_at, updated_at
            FROM categories
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

        Ok(row.into())
    }

    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        let name = input.name.trim();
        self.ensure_unique_name(name, None).await?;

        // New categories go to the end unless placed explicitly
        let sort_order = match input.sort_order {
            Some(order) => order,
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM categories WHERE deleted_at IS NULL",
                )
                .fetch_one(&self.db)
                .await?
            }
        };

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (name, description, sort_order)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, sort_order, is_active, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(&input.description)
        .bind(sort_order)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> AppResult<Category> {
        input.validate()?;
        self.get_category(category_id).await?;

        if let Some(ref name) = input.name {
            self.ensure_unique_name(name.trim(), Some(category_id)).await?;
        }

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                sort_order = COALESCE($4, sort_order),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, description, sort_order, is_active, created_at, updated_at
            "#,
        )
        .bind(category_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Soft delete a category that no longer holds menu items
    pub async fn delete_category(&self, category_id: Uuid) -> AppResult<()> {
        self.get_category(category_id).await?;

        let items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM menu_items WHERE category_id = $1 AND deleted_at IS NULL",
        )
        .bind(category_id)
        .fetch_one(&self.db)
        .await?;

        if items > 0 {
            return Err(AppError::conflict(
                "category",
                format!("Category still contains {} menu item(s)", items),
            ));
        }

        sqlx::query("UPDATE categories SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(category_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Rewrite sort_order to follow the given id order
    pub async fn reorder_categories(&self, input: ReorderCategoriesInput) -> AppResult<Vec<Category>> {
        let mut tx = self.db.begin().await?;

        for (position, id) in input.ids.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE categories SET sort_order = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Category"));
            }
        }

        tx.commit().await?;

        self.list_categories(true).await
    }

    async fn ensure_unique_name(&self, name: &str, exclude: Option<Uuid>) -> AppResult<()> {
        let duplicate = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM categories
            WHERE LOWER(name) = LOWER($1) AND deleted_at IS NULL AND ($2::uuid IS NULL OR id != $2)
            "#,
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;

        if duplicate > 0 {
            return Err(AppError::conflict(
                "category",
                "A category with this name already exists",
            ));
        }
        Ok(())
    }
}
