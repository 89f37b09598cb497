//! Order placement, kitchen workflow and payments

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    calculate_change, calculate_totals, line_total, Discount, LineInput, MenuItem, Order,
    OrderItem, OrderStatus, OrderType, PaginatedResponse, Pagination, PaymentMethod,
    PaymentStatus, RealtimeEvent, Role, MAX_QUANTITY,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::realtime::EventHub;
use crate::services::{menu::MenuService, settings::SettingsService};

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    events: EventHub,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: i32,
    day_session_id: Uuid,
    order_type: String,
    table_number: Option<String>,
    customer_name: Option<String>,
    status: String,
    payment_status: String,
    payment_method: Option<String>,
    subtotal: Decimal,
    discount_amount: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    total: Decimal,
    amount_tendered: Option<Decimal>,
    change_due: Option<Decimal>,
    notes: Option<String>,
    cancel_reason: Option<String>,
    created_by: Uuid,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    menu_item_id: Uuid,
    variant_id: Option<Uuid>,
    item_name: String,
    variant_name: Option<String>,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    notes: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            menu_item_id: row.menu_item_id,
            variant_id: row.variant_id,
            item_name: row.item_name,
            variant_name: row.variant_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
            notes: row.notes,
        }
    }
}

fn corrupt(e: shared::ParseEnumError) -> AppError {
    AppError::Internal(format!("Corrupt order record: {}", e))
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> AppResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            day_session_id: self.day_session_id,
            order_type: self.order_type.parse().map_err(corrupt)?,
            table_number: self.table_number,
            customer_name: self.customer_name,
            status: self.status.parse().map_err(corrupt)?,
            payment_status: self.payment_status.parse().map_err(corrupt)?,
            payment_method: self
                .payment_method
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_rate: self.tax_rate,
            tax_amount: self.tax_amount,
            total: self.total,
            amount_tendered: self.amount_tendered,
            change_due: self.change_due,
            notes: self.notes,
            cancel_reason: self.cancel_reason,
            created_by: self.created_by,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

const ORDER_COLUMNS: &str = r#"
    id, order_number, day_session_id, order_type, table_number, customer_name, status,
    payment_status, payment_method, subtotal, discount_amount, tax_rate, tax_amount, total,
    amount_tendered, change_due, notes, cancel_reason, created_by, paid_at, created_at, updated_at
"#;

/// One requested line on a new or edited order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineInput {
    pub menu_item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub order_type: OrderType,
    pub table_number: Option<String>,
    #[validate(length(max = 100, message = "Customer name is too long"))]
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub discount: Discount,
    pub items: Vec<OrderLineInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub table_number: Option<String>,
    #[validate(length(max = 100, message = "Customer name is too long"))]
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub discount: Option<Discount>,
    pub items: Option<Vec<OrderLineInput>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount_tendered: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    /// Comma separated list of statuses
    pub status: Option<String>,
    pub day_session_id: Option<Uuid>,
    #[serde(default)]
    pub active_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A line priced against the current menu
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub menu_item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub item_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub notes: Option<String>,
}

impl ResolvedLine {
    pub fn pricing(&self) -> LineInput {
        LineInput {
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

/// Price one requested line against its menu item.
///
/// Items with variants use the requested variant, or the default variant when
/// none is requested.
pub fn resolve_line(item: &MenuItem, line: &OrderLineInput) -> AppResult<ResolvedLine> {
    if !item.is_available {
        return Err(AppError::BusinessRule(format!(
            "'{}' is currently unavailable",
            item.name
        )));
    }
    if line.quantity <= 0 || line.quantity > MAX_QUANTITY {
        return Err(AppError::validation(
            "items",
            format!("Quantity must be between 1 and {}", MAX_QUANTITY),
        ));
    }

    let variant = match line.variant_id {
        Some(variant_id) => Some(
            item.variants
                .iter()
                .find(|v| v.id == variant_id)
                .ok_or_else(|| {
                    AppError::validation(
                        "items",
                        format!("Variant does not belong to '{}'", item.name),
                    )
                })?,
        ),
        None if item.variants.is_empty() => None,
        None => Some(item.default_variant().ok_or_else(|| {
            AppError::validation("items", format!("Choose a variant for '{}'", item.name))
        })?),
    };

    Ok(ResolvedLine {
        menu_item_id: item.id,
        variant_id: variant.map(|v| v.id),
        item_name: item.name.clone(),
        variant_name: variant.map(|v| v.name.clone()),
        unit_price: variant.map(|v| v.price).unwrap_or(item.price),
        quantity: line.quantity,
        notes: line.notes.clone(),
    })
}

/// Check that `role` may move an order from `from` to `to`
pub fn check_status_change(
    role: Role,
    from: OrderStatus,
    to: OrderStatus,
    payment_status: PaymentStatus,
    reason: Option<&str>,
) -> AppResult<()> {
    if !role.can_set_order_status(to) {
        return Err(AppError::InsufficientPermissions);
    }
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidStateTransition(format!(
            "Cannot change order from {} to {}",
            from, to
        )));
    }
    if to == OrderStatus::Cancelled {
        if payment_status == PaymentStatus::Paid {
            return Err(AppError::BusinessRule(
                "Paid orders must be refunded before cancelling".to_string(),
            ));
        }
        if reason.map(str::trim).unwrap_or_default().is_empty() {
            return Err(AppError::validation("reason", "A reason is required to cancel"));
        }
    }
    Ok(())
}

/// Result of settling an order
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub amount_tendered: Decimal,
    pub change_due: Decimal,
    pub new_status: OrderStatus,
}

/// Work out tender, change and the follow-up status for a payment
pub fn settle_payment(
    status: OrderStatus,
    payment_status: PaymentStatus,
    total: Decimal,
    method: PaymentMethod,
    amount_tendered: Option<Decimal>,
) -> AppResult<PaymentOutcome> {
    if status == OrderStatus::Cancelled {
        return Err(AppError::BusinessRule("Cancelled orders cannot be paid".to_string()));
    }
    if payment_status != PaymentStatus::Unpaid {
        return Err(AppError::conflict("payment", "Order has already been settled"));
    }

    let (amount_tendered, change_due) = match method {
        PaymentMethod::Cash => {
            let tendered = amount_tendered.ok_or_else(|| {
                AppError::validation("amount_tendered", "Cash payments require the amount tendered")
            })?;
            (tendered, calculate_change(total, tendered)?)
        }
        // Card and mobile charge the exact amount
        PaymentMethod::Card | PaymentMethod::Mobile => (total, Decimal::ZERO),
    };

    let new_status = if status == OrderStatus::Served {
        OrderStatus::Completed
    } else {
        status
    };

    Ok(PaymentOutcome {
        amount_tendered,
        change_due,
        new_status,
    })
}

/// Statuses shown on the kitchen display, as stored
pub fn kitchen_statuses() -> Vec<&'static str> {
    OrderStatus::ALL
        .iter()
        .filter(|s| s.is_kitchen_visible())
        .map(OrderStatus::as_str)
        .collect()
}

/// Parse the `status` filter (`pending,preparing`)
pub fn parse_status_filter(raw: Option<&str>) -> AppResult<Vec<OrderStatus>> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<OrderStatus>()
                    .map_err(|e| AppError::validation("status", e.to_string()))
            })
            .collect()
    })
    .unwrap_or_else(|| Ok(Vec::new()))
}

fn validate_order_type(order_type: OrderType, table_number: Option<&str>) -> AppResult<()> {
    match (order_type, table_number) {
        (OrderType::DineIn, None) => Err(AppError::validation(
            "table_number",
            "Dine-in orders require a table number",
        )),
        (_, Some(table)) => {
            shared::validate_table_number(table).map_err(|m| AppError::validation("table_number", m))
        }
        _ => Ok(()),
    }
}

impl OrderService {
    pub fn new(db: PgPool, events: EventHub) -> Self {
        Self { db, events }
    }

    /// Place a new order in the open day session
    pub async fn create_order(&self, created_by: Uuid, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;
        validate_order_type(input.order_type, input.table_number.as_deref())?;

        let lines = self.resolve_lines(&input.items).await?;
        let tax_rate = SettingsService::new(self.db.clone()).get_settings().await?.tax_rate;
        let pricing: Vec<LineInput> = lines.iter().map(ResolvedLine::pricing).collect();
        let totals = calculate_totals(&pricing, input.discount, tax_rate)?;

        let mut tx = self.db.begin().await?;

        // Bumping the counter locks the open session row until commit
        let (day_session_id, order_number) = sqlx::query_as::<_, (Uuid, i32)>(
            r#"
            UPDATE day_sessions SET order_seq = order_seq + 1
            WHERE status = 'open'
            RETURNING id, order_seq
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::BusinessRule("No day session is open; open the day first".to_string())
        })?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (
                order_number, day_session_id, order_type, table_number, customer_name,
                subtotal, discount_amount, tax_rate, tax_amount, total, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(order_number)
        .bind(day_session_id)
        .bind(input.order_type.as_str())
        .bind(input.table_number.as_deref().map(str::trim))
        .bind(&input.customer_name)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_items(&mut tx, order_id, &lines).await?;

        tx.commit().await?;

        let order = self.get_order(order_id).await?;

        tracing::info!(
            %order_id,
            order_number,
            total = %order.total,
            items = order.items.len(),
            "order created"
        );

        self.events
            .publish(RealtimeEvent::OrderCreated(Box::new(order.clone())));

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

        let mut orders = self.attach_items(vec![row]).await?;
        orders.pop().ok_or_else(|| AppError::not_found("Order"))
    }

    pub async fn list_orders(&self, filter: OrderFilter) -> AppResult<PaginatedResponse<Order>> {
        let statuses: Vec<String> = parse_status_filter(filter.status.as_deref())?
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let page = Pagination::new(filter.limit, filter.offset);

        const WHERE: &str = r#"
            WHERE (cardinality($1::text[]) = 0 OR status = ANY($1))
              AND ($2::uuid IS NULL OR day_session_id = $2)
              AND (NOT $3 OR status NOT IN ('completed', 'cancelled'))
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM orders {WHERE}"))
            .bind(&statuses)
            .bind(filter.day_session_id)
            .bind(filter.active_only)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(&statuses)
        .bind(filter.day_session_id)
        .bind(filter.active_only)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: self.attach_items(rows).await?,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Orders on the kitchen display, oldest first
    pub async fn kitchen_queue(&self) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = ANY($1)
            ORDER BY created_at ASC
            "#
        ))
        .bind(kitchen_statuses())
        .fetch_all(&self.db)
        .await?;

        self.attach_items(rows).await
    }

    /// Edit a pending order; totals are recomputed
    pub async fn update_order(&self, order_id: Uuid, input: UpdateOrderInput) -> AppResult<Order> {
        input.validate()?;
        let existing = self.get_order(order_id).await?;

        if existing.status != OrderStatus::Pending || existing.payment_status != PaymentStatus::Unpaid {
            return Err(AppError::InvalidStateTransition(
                "Only unpaid pending orders can be edited".to_string(),
            ));
        }

        let table_number = input.table_number.clone().or(existing.table_number.clone());
        validate_order_type(existing.order_type, table_number.as_deref())?;

        let new_lines = match input.items {
            Some(ref items) => Some(self.resolve_lines(items).await?),
            None => None,
        };
        let pricing: Vec<LineInput> = match new_lines {
            Some(ref lines) => lines.iter().map(ResolvedLine::pricing).collect(),
            None => existing
                .items
                .iter()
                .map(|i| LineInput {
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                })
                .collect(),
        };

        // Keep the discount the till entered unless a new one is given
        let discount = input
            .discount
            .unwrap_or(Discount::Amount(existing.discount_amount));
        let totals = calculate_totals(&pricing, discount, existing.tax_rate)?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET
                table_number = $2,
                customer_name = COALESCE($3, customer_name),
                notes = COALESCE($4, notes),
                subtotal = $5,
                discount_amount = $6,
                tax_amount = $7,
                total = $8,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND payment_status = 'unpaid'
            "#,
        )
        .bind(order_id)
        .bind(table_number.as_deref().map(str::trim))
        .bind(&input.customer_name)
        .bind(&input.notes)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidStateTransition(
                "Order changed while it was being edited".to_string(),
            ));
        }

        if let Some(ref lines) = new_lines {
            sqlx::query("DELETE FROM order_items WHERE order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
            Self::insert_items(&mut tx, order_id, lines).await?;
        }

        tx.commit().await?;

        let order = self.get_order(order_id).await?;
        self.events
            .publish(RealtimeEvent::OrderUpdated(Box::new(order.clone())));

        Ok(order)
    }

    /// Move an order through the kitchen / service workflow
    pub async fn update_status(
        &self,
        role: Role,
        order_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;

        let (order_number, current, payment_status) =
            Self::lock_order(&mut tx, order_id).await?;

        check_status_change(
            role,
            current,
            input.status,
            payment_status,
            input.reason.as_deref(),
        )?;

        let cancel_reason = if input.status == OrderStatus::Cancelled {
            input.reason.as_deref().map(str::trim)
        } else {
            None
        };

        sqlx::query(
            r#"
            UPDATE orders SET
                status = $2,
                cancel_reason = COALESCE($3, cancel_reason),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.status.as_str())
        .bind(cancel_reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%order_id, order_number, from = %current, to = %input.status, "order status changed");

        let order = self.get_order(order_id).await?;
        self.events.publish(RealtimeEvent::OrderStatusChanged {
            order_id,
            order_number,
            from: current,
            to: input.status,
        });
        self.events
            .publish(RealtimeEvent::OrderUpdated(Box::new(order.clone())));

        Ok(order)
    }

    /// Take payment for an order
    pub async fn record_payment(&self, order_id: Uuid, input: PaymentInput) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;

        let (order_number, status, payment_status) = Self::lock_order(&mut tx, order_id).await?;
        let total = sqlx::query_scalar::<_, Decimal>("SELECT total FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;

        let outcome = settle_payment(
            status,
            payment_status,
            total,
            input.method,
            input.amount_tendered,
        )?;

        sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = 'paid',
                payment_method = $2,
                amount_tendered = $3,
                change_due = $4,
                status = $5,
                paid_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.method.as_str())
        .bind(outcome.amount_tendered)
        .bind(outcome.change_due)
        .bind(outcome.new_status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%order_id, order_number, method = %input.method, %total, "payment recorded");

        self.events.publish(RealtimeEvent::OrderPaid {
            order_id,
            order_number,
            payment_method: input.method,
            total,
        });
        if outcome.new_status != status {
            self.events.publish(RealtimeEvent::OrderStatusChanged {
                order_id,
                order_number,
                from: status,
                to: outcome.new_status,
            });
        }

        let order = self.get_order(order_id).await?;
        self.events
            .publish(RealtimeEvent::OrderUpdated(Box::new(order.clone())));

        Ok(order)
    }

    /// Mark a paid order as refunded
    pub async fn refund(&self, order_id: Uuid) -> AppResult<Order> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET payment_status = 'refunded', updated_at = NOW()
            WHERE id = $1 AND payment_status = 'paid'
            "#,
        )
        .bind(order_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing order from one that is not refundable
            self.get_order(order_id).await?;
            return Err(AppError::InvalidStateTransition(
                "Only paid orders can be refunded".to_string(),
            ));
        }

        tracing::info!(%order_id, "order refunded");

        let order = self.get_order(order_id).await?;
        self.events
            .publish(RealtimeEvent::OrderUpdated(Box::new(order.clone())));

        Ok(order)
    }

    async fn lock_order(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> AppResult<(i32, OrderStatus, PaymentStatus)> {
        let (order_number, status, payment_status) = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT order_number, status, payment_status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

        Ok((
            order_number,
            status.parse().map_err(corrupt)?,
            payment_status.parse().map_err(corrupt)?,
        ))
    }

    async fn resolve_lines(&self, lines: &[OrderLineInput]) -> AppResult<Vec<ResolvedLine>> {
        if lines.is_empty() {
            return Err(AppError::validation("items", "Order must contain at least one item"));
        }

        let ids: Vec<Uuid> = lines.iter().map(|l| l.menu_item_id).collect();
        let items = MenuService::new(self.db.clone()).get_items_by_ids(&ids).await?;

        lines
            .iter()
            .map(|line| {
                let item = items.get(&line.menu_item_id).ok_or_else(|| {
                    AppError::validation("items", format!("Menu item {} does not exist", line.menu_item_id))
                })?;
                resolve_line(item, line)
            })
            .collect()
    }

    async fn insert_items(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        lines: &[ResolvedLine],
    ) -> AppResult<()> {
        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, menu_item_id, variant_id, item_name, variant_name,
                    unit_price, quantity, line_total, notes, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order_id)
            .bind(line.menu_item_id)
            .bind(line.variant_id)
            .bind(&line.item_name)
            .bind(&line.variant_name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line_total(&line.pricing())?)
            .bind(&line.notes)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, menu_item_id, variant_id, item_name, variant_name,
                   unit_price, quantity, line_total, notes
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item.into());
        }

        rows.into_iter()
            .map(|row| {
                let items = grouped.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}
