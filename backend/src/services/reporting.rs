//! Reporting service for end-of-day figures and data export

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{DaySummary, ItemSales, PaymentBreakdown};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Number of best sellers reported per day
const TOP_ITEMS: i64 = 10;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionTotals {
    order_count: i64,
    completed_count: i64,
    cancelled_count: i64,
    gross_sales: Decimal,
    discount_total: Decimal,
    tax_total: Decimal,
    net_sales: Decimal,
}

/// One exported order line in the day CSV
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderExportRow {
    pub order_number: i32,
    pub created_at: DateTime<Utc>,
    pub order_type: String,
    pub table_number: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub cancel_reason: Option<String>,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Sales figures for a day session.
    ///
    /// Only orders whose payment stands (`paid`) count towards sales; refunded
    /// and unpaid orders are reported in the counts only.
    pub async fn day_summary(&self, session_id: Uuid) -> AppResult<DaySummary> {
        let (opening_cash, closing_cash) = sqlx::query_as::<_, (Decimal, Option<Decimal>)>(
            "SELECT opening_cash, closing_cash FROM day_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Day session"))?;

        let totals = sqlx::query_as::<_, SessionTotals>(
            r#"
            SELECT
                COUNT(*) AS order_count,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed_count,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_count,
                COALESCE(SUM(subtotal) FILTER (WHERE payment_status = 'paid'), 0) AS gross_sales,
                COALESCE(SUM(discount_amount) FILTER (WHERE payment_status = 'paid'), 0) AS discount_total,
                COALESCE(SUM(tax_amount) FILTER (WHERE payment_status = 'paid'), 0) AS tax_total,
                COALESCE(SUM(total) FILTER (WHERE payment_status = 'paid'), 0) AS net_sales
            FROM orders
            WHERE day_session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.db)
        .await?;

        let by_method = sqlx::query_as::<_, (String, i64, Decimal)>(
            r#"
            SELECT payment_method, COUNT(*), COALESCE(SUM(total), 0)
            FROM orders
            WHERE day_session_id = $1 AND payment_status = 'paid' AND payment_method IS NOT NULL
            GROUP BY payment_method
            ORDER BY payment_method
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.db)
        .await?;

        let by_payment_method = by_method
            .into_iter()
            .map(|(method, order_count, amount)| {
                Ok(PaymentBreakdown {
                    method: method
                        .parse()
                        .map_err(|e| AppError::Internal(format!("{}", e)))?,
                    order_count,
                    amount,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let top_items = sqlx::query_as::<_, (String, i64, Decimal)>(
            r#"
            SELECT oi.item_name, SUM(oi.quantity)::BIGINT, SUM(oi.line_total)
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.day_session_id = $1 AND o.payment_status = 'paid'
            GROUP BY oi.item_name
            ORDER BY 2 DESC, 3 DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(TOP_ITEMS)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(item_name, quantity, revenue)| ItemSales {
            item_name,
            quantity,
            revenue,
        })
        .collect();

        let expected_cash = DaySummary::expected_cash(opening_cash, &by_payment_method);

        Ok(DaySummary {
            session_id,
            order_count: totals.order_count,
            completed_count: totals.completed_count,
            cancelled_count: totals.cancelled_count,
            gross_sales: totals.gross_sales,
            discount_total: totals.discount_total,
            tax_total: totals.tax_total,
            net_sales: totals.net_sales,
            by_payment_method,
            expected_cash,
            cash_difference: closing_cash.map(|counted| counted - expected_cash),
            top_items,
        })
    }

    /// Every order of a day session, in till order
    pub async fn day_orders(&self, session_id: Uuid) -> AppResult<Vec<OrderExportRow>> {
        let rows = sqlx::query_as::<_, OrderExportRow>(
            r#"
            SELECT order_number, created_at, order_type, table_number, status, payment_status,
                   payment_method, subtotal, discount_amount, tax_amount, total, cancel_reason
            FROM orders
            WHERE day_session_id = $1
            ORDER BY order_number ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_export_to_csv_writes_header_and_rows() {
        let rows = vec![OrderExportRow {
            order_number: 7,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            order_type: "dine_in".to_string(),
            table_number: Some("T4".to_string()),
            status: "completed".to_string(),
            payment_status: "paid".to_string(),
            payment_method: Some("cash".to_string()),
            subtotal: Decimal::new(2000, 2),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::new(140, 2),
            total: Decimal::new(2140, 2),
            cancel_reason: None,
        }];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "order_number,created_at,order_type,table_number,status,payment_status,\
             payment_method,subtotal,discount_amount,tax_amount,total,cancel_reason"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("7,2024-03-01T12:30:00Z,dine_in,T4,completed,paid,cash,"));
        assert!(row.ends_with("21.40,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_to_csv_empty() {
        let rows: Vec<OrderExportRow> = Vec::new();
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
