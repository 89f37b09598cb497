//! Opening and closing the trading day

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{DaySession, DaySummary, OrderStatus, PaginatedResponse, Pagination, RealtimeEvent};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult, UNIQUE_VIOLATION};
use crate::realtime::EventHub;
use crate::services::{order::OrderService, reporting::ReportingService};

/// Reason recorded on orders cancelled by a forced close
pub const DAY_CLOSED_REASON: &str = "day closed";

#[derive(Clone)]
pub struct DaySessionService {
    db: PgPool,
    events: EventHub,
}

#[derive(Debug, FromRow)]
struct DaySessionRow {
    id: Uuid,
    status: String,
    opened_by: Uuid,
    opened_at: DateTime<Utc>,
    opening_cash: Decimal,
    closed_by: Option<Uuid>,
    closed_at: Option<DateTime<Utc>>,
    closing_cash: Option<Decimal>,
    notes: Option<String>,
}

impl TryFrom<DaySessionRow> for DaySession {
    type Error = AppError;

    fn try_from(row: DaySessionRow) -> AppResult<Self> {
        Ok(DaySession {
            id: row.id,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("{}", e)))?,
            opened_by: row.opened_by,
            opened_at: row.opened_at,
            opening_cash: row.opening_cash,
            closed_by: row.closed_by,
            closed_at: row.closed_at,
            closing_cash: row.closing_cash,
            notes: row.notes,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, status, opened_by, opened_at, opening_cash, closed_by, closed_at, closing_cash, notes";

#[derive(Debug, FromRow)]
struct ClosedOrderRow {
    id: Uuid,
    order_number: i32,
    previous_status: String,
    status: String,
}

/// An order moved to a terminal status by a forced close
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedOrder {
    pub order_id: Uuid,
    pub order_number: i32,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl TryFrom<ClosedOrderRow> for ClosedOrder {
    type Error = AppError;

    fn try_from(row: ClosedOrderRow) -> AppResult<Self> {
        let parse = |s: &str| {
            s.parse::<OrderStatus>()
                .map_err(|e| AppError::Internal(format!("{}", e)))
        };
        Ok(ClosedOrder {
            order_id: row.id,
            order_number: row.order_number,
            from: parse(&row.previous_status)?,
            to: parse(&row.status)?,
        })
    }
}

/// One `order_status_changed` event per order a forced close touched
pub fn status_change_events(closed: &[ClosedOrder]) -> Vec<RealtimeEvent> {
    closed
        .iter()
        .map(|o| RealtimeEvent::OrderStatusChanged {
            order_id: o.order_id,
            order_number: o.order_number,
            from: o.from,
            to: o.to,
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenDayInput {
    #[serde(default)]
    pub opening_cash: Decimal,
    #[validate(length(max = 1000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseDayInput {
    pub closing_cash: Decimal,
    #[serde(default)]
    pub force: bool,
    #[validate(length(max = 1000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaySessionQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn validate_cash(field: &str, amount: Decimal) -> AppResult<()> {
    shared::validate_price(amount).map_err(|m| AppError::validation(field, m))
}

impl DaySessionService {
    pub fn new(db: PgPool, events: EventHub) -> Self {
        Self { db, events }
    }

    /// The open session, if any
    pub async fn current(&self) -> AppResult<Option<DaySession>> {
        sqlx::query_as::<_, DaySessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM day_sessions WHERE status = 'open'"
        ))
        .fetch_optional(&self.db)
        .await?
        .map(DaySession::try_from)
        .transpose()
    }

    pub async fn get(&self, session_id: Uuid) -> AppResult<DaySession> {
        sqlx::query_as::<_, DaySessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM day_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Day session"))?
        .try_into()
    }

    /// Session history, newest first
    pub async fn list(&self, query: DaySessionQuery) -> AppResult<PaginatedResponse<DaySession>> {
        let page = Pagination::new(query.limit, query.offset);

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM day_sessions")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, DaySessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM day_sessions ORDER BY opened_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows
                .into_iter()
                .map(DaySession::try_from)
                .collect::<AppResult<_>>()?,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    pub async fn open(&self, opened_by: Uuid, input: OpenDayInput) -> AppResult<DaySession> {
        input.validate()?;
        validate_cash("opening_cash", input.opening_cash)?;

        if self.current().await?.is_some() {
            return Err(AppError::conflict("day_session", "A day session is already open"));
        }

        // The partial unique index settles races between two tills
        let row = sqlx::query_as::<_, DaySessionRow>(&format!(
            r#"
            INSERT INTO day_sessions (opened_by, opening_cash, notes)
            VALUES ($1, $2, $3)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(opened_by)
        .bind(input.opening_cash)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                AppError::conflict("day_session", "A day session is already open")
            }
            other => AppError::from(other),
        })?;

        let session = DaySession::try_from(row)?;

        tracing::info!(session_id = %session.id, opening_cash = %session.opening_cash, "day opened");
        self.events.publish(RealtimeEvent::DayOpened(session.clone()));

        Ok(session)
    }

    /// Close the open session and return its final summary
    pub async fn close(&self, closed_by: Uuid, input: CloseDayInput) -> AppResult<(DaySession, DaySummary)> {
        input.validate()?;
        validate_cash("closing_cash", input.closing_cash)?;

        let mut tx = self.db.begin().await?;

        let session_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM day_sessions WHERE status = 'open' FOR UPDATE",
        )
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Open day session"))?;

        let (active, active_paid) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE payment_status = 'paid')
            FROM orders
            WHERE day_session_id = $1 AND status NOT IN ('completed', 'cancelled')
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        if active > 0 && !input.force {
            return Err(AppError::BusinessRule(format!(
                "{} order(s) are still open; finish them or close with force",
                active
            )));
        }

        let mut closed_orders = Vec::new();
        if active > 0 {
            // Paid orders are settled, so they are completed rather than voided
            let rows = sqlx::query_as::<_, ClosedOrderRow>(
                r#"
                UPDATE orders o SET
                    status = CASE WHEN o.payment_status = 'paid' THEN 'completed' ELSE 'cancelled' END,
                    cancel_reason = CASE WHEN o.payment_status = 'paid' THEN o.cancel_reason ELSE $2 END,
                    updated_at = NOW()
                FROM (
                    SELECT id, status FROM orders
                    WHERE day_session_id = $1 AND status NOT IN ('completed', 'cancelled')
                    FOR UPDATE
                ) prev
                WHERE o.id = prev.id
                RETURNING o.id, o.order_number, prev.status AS previous_status, o.status
                "#,
            )
            .bind(session_id)
            .bind(DAY_CLOSED_REASON)
            .fetch_all(&mut *tx)
            .await?;

            closed_orders = rows
                .into_iter()
                .map(ClosedOrder::try_from)
                .collect::<AppResult<Vec<_>>>()?;

            tracing::warn!(
                %session_id,
                orders = closed_orders.len(),
                completed = active_paid,
                "day force-closed with open orders"
            );
        }

        let row = sqlx::query_as::<_, DaySessionRow>(&format!(
            r#"
            UPDATE day_sessions SET
                status = 'closed',
                closed_by = $2,
                closed_at = NOW(),
                closing_cash = $3,
                notes = COALESCE($4, notes)
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(closed_by)
        .bind(input.closing_cash)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let session = DaySession::try_from(row)?;
        self.publish_closed_orders(&closed_orders).await;

        let summary = ReportingService::new(self.db.clone())
            .day_summary(session.id)
            .await?;

        tracing::info!(
            %session_id,
            orders = summary.order_count,
            net_sales = %summary.net_sales,
            cash_difference = ?summary.cash_difference,
            "day closed"
        );

        self.events.publish(RealtimeEvent::DayClosed {
            session_id,
            summary: Box::new(summary.clone()),
        });

        Ok((session, summary))
    }

    async fn publish_closed_orders(&self, closed: &[ClosedOrder]) {
        for event in status_change_events(closed) {
            self.events.publish(event);
        }

        let orders = OrderService::new(self.db.clone(), self.events.clone());
        for order in closed {
            match orders.get_order(order.order_id).await {
                Ok(order) => {
                    self.events.publish(RealtimeEvent::OrderUpdated(Box::new(order)));
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.order_id, error = %e, "could not reload force-closed order")
                }
            }
        }
    }

    pub async fn summary(&self, session_id: Uuid) -> AppResult<DaySummary> {
        ReportingService::new(self.db.clone())
            .day_summary(session_id)
            .await
    }

    /// CSV of every order in the session
    pub async fn export_csv(&self, session_id: Uuid) -> AppResult<String> {
        self.get(session_id).await?;
        let rows = ReportingService::new(self.db.clone())
            .day_orders(session_id)
            .await?;
        ReportingService::export_to_csv(&rows)
    }
}
