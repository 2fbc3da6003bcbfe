//! SQLite ReportRepository implementation.
//!
//! Aggregates (`GROUP BY` / `HAVING`), multi-table joins and the two ways of
//! loading related rows: one joined query, or one query per parent row.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::helpers::{
    ORDER_COLUMNS, PRODUCT_COLUMNS, USER_COLUMNS, order_from_row, prefixed_columns,
    product_from_row, user_from_row,
};
use super::order::{fetch_order_products, fetch_orders_for_user};
use super::product::fetch_product;
use crate::db::{
    DbError, DbResult, OrderDetail, OrderLine, OrderLineRow, OrderWithUser, Referral,
    ReportRepository, UserOrderCount, UserOrders, UserQuantityTotal,
};

/// SQLx-backed report repository.
pub struct SqliteReportRepository<'a> {
    pub(crate) conn: &'a mut SqliteConnection,
}

fn line_row_from_row(row: &SqliteRow) -> DbResult<OrderLineRow> {
    Ok(OrderLineRow {
        product: product_from_row(row, "p_")?,
        order: order_from_row(row, "o_")?,
        user_name: row.try_get("user_name")?,
        quantity: row.try_get("quantity")?,
    })
}

impl<'a> ReportRepository for SqliteReportRepository<'a> {
    async fn order_count(&mut self, user_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    async fn order_counts(&mut self) -> DbResult<Vec<UserOrderCount>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT u.id, u.full_name, COUNT(o.order_id) \
             FROM users u JOIN orders o ON o.user_id = u.id \
             GROUP BY u.id, u.full_name \
             ORDER BY u.id",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, full_name, orders)| UserOrderCount {
                user_id,
                full_name,
                orders,
            })
            .collect())
    }

    async fn quantity_totals(&mut self, min: Option<i64>) -> DbResult<Vec<UserQuantityTotal>> {
        // The threshold applies to the aggregate, so it must be HAVING
        let having = if min.is_some() {
            "HAVING SUM(op.quantity) > ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT u.id, u.full_name, SUM(op.quantity) \
             FROM users u \
             JOIN orders o ON o.user_id = u.id \
             JOIN order_products op ON op.order_id = o.order_id \
             GROUP BY u.id, u.full_name {} \
             ORDER BY u.id",
            having
        );

        let mut query = sqlx::query_as::<_, (i64, String, i64)>(&sql);
        if let Some(min) = min {
            query = query.bind(min);
        }
        let rows = query.fetch_all(&mut *self.conn).await?;

        debug!(?min, groups = rows.len(), "quantity totals");
        Ok(rows
            .into_iter()
            .map(|(user_id, full_name, quantity)| UserQuantityTotal {
                user_id,
                full_name,
                quantity,
            })
            .collect())
    }

    async fn orders_with_user(&mut self, user_id: i64) -> DbResult<Vec<OrderWithUser>> {
        let sql = format!(
            "SELECT {}, {} FROM orders o \
             JOIN users u ON u.id = o.user_id \
             WHERE u.id = ? ORDER BY o.order_id",
            prefixed_columns("o", ORDER_COLUMNS, "o_"),
            prefixed_columns("u", USER_COLUMNS, "u_")
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderWithUser {
                    order: order_from_row(row, "o_")?,
                    user: user_from_row(row, "u_")?,
                })
            })
            .collect()
    }

    async fn user_order_lines(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>> {
        let sql = format!(
            "SELECT op.quantity, u.user_name, {}, {} \
             FROM order_products op \
             JOIN orders o ON o.order_id = op.order_id \
             JOIN users u ON u.id = o.user_id \
             JOIN products p ON p.product_id = op.product_id \
             WHERE u.id = ? \
             ORDER BY o.order_id, p.product_id",
            prefixed_columns("p", PRODUCT_COLUMNS, "p_"),
            prefixed_columns("o", ORDER_COLUMNS, "o_")
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.conn)
            .await?;

        debug!(user_id, rows = rows.len(), "order lines loaded in one query");
        rows.iter().map(line_row_from_row).collect()
    }

    async fn user_order_lines_per_row(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>> {
        let user_name: Option<Option<String>> =
            sqlx::query_scalar("SELECT user_name FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *self.conn)
                .await?;
        let Some(user_name) = user_name else {
            return Ok(vec![]);
        };

        let mut queries = 1;
        let mut result = vec![];

        let orders = fetch_orders_for_user(&mut *self.conn, user_id).await?;
        queries += 1;

        for order in orders {
            let links = fetch_order_products(&mut *self.conn, order.order_id).await?;
            queries += 1;

            for link in links {
                let product = fetch_product(&mut *self.conn, link.product_id)
                    .await?
                    .ok_or_else(|| DbError::NotFound {
                        entity_type: "Product".to_string(),
                        id: link.product_id.to_string(),
                    })?;
                queries += 1;

                result.push(OrderLineRow {
                    product,
                    order: order.clone(),
                    user_name: user_name.clone(),
                    quantity: link.quantity,
                });
            }
        }

        debug!(user_id, rows = result.len(), queries, "order lines loaded per row");
        Ok(result)
    }

    async fn referrals(&mut self) -> DbResult<Vec<Referral>> {
        let rows: Vec<(i64, String, i64, String)> = sqlx::query_as(
            "SELECT r.id, r.full_name, u.id, u.full_name \
             FROM users u JOIN users r ON r.id = u.referrer_id \
             ORDER BY r.id, u.id",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(referrer_id, referrer_name, referral_id, referral_name)| Referral {
                    referrer_id,
                    referrer_name,
                    referral_id,
                    referral_name,
                },
            )
            .collect())
    }

    async fn users_with_orders(&mut self) -> DbResult<Vec<UserOrders>> {
        let sql = format!(
            "SELECT {}, {}, {}, op.quantity \
             FROM users u \
             LEFT JOIN orders o ON o.user_id = u.id \
             LEFT JOIN order_products op ON op.order_id = o.order_id \
             LEFT JOIN products p ON p.product_id = op.product_id \
             ORDER BY u.id, o.order_id, p.product_id",
            prefixed_columns("u", USER_COLUMNS, "u_"),
            prefixed_columns("o", ORDER_COLUMNS, "o_"),
            prefixed_columns("p", PRODUCT_COLUMNS, "p_")
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *self.conn).await?;

        // Rows arrive sorted, so each level only ever extends its last entry
        let mut tree: Vec<UserOrders> = vec![];
        for row in &rows {
            let user_id: i64 = row.try_get("u_id")?;
            if tree.last().map(|u| u.user.id) != Some(user_id) {
                tree.push(UserOrders {
                    user: user_from_row(row, "u_")?,
                    orders: vec![],
                });
            }
            let Some(entry) = tree.last_mut() else {
                continue;
            };

            let order_id: Option<i64> = row.try_get("o_order_id")?;
            let Some(order_id) = order_id else {
                continue;
            };
            if entry.orders.last().map(|o| o.order.order_id) != Some(order_id) {
                entry.orders.push(OrderDetail {
                    order: order_from_row(row, "o_")?,
                    lines: vec![],
                });
            }

            let product_id: Option<i64> = row.try_get("p_product_id")?;
            if product_id.is_none() {
                continue;
            }
            if let Some(detail) = entry.orders.last_mut() {
                detail.lines.push(OrderLine {
                    product: product_from_row(row, "p_")?,
                    quantity: row.try_get("quantity")?,
                });
            }
        }

        debug!(users = tree.len(), rows = rows.len(), "users with orders loaded");
        Ok(tree)
    }
}
