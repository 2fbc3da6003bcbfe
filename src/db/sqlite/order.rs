//! SQLite OrderRepository implementation.

use sqlx::{Connection, Row, SqliteConnection};
use tracing::debug;

use super::helpers::{
    ORDER_COLUMNS, PRODUCT_COLUMNS, column_list, order_from_row, prefixed_columns,
    product_from_row,
};
use crate::db::{DbResult, LineItem, Order, OrderLine, OrderProduct, OrderRepository};

/// SQLx-backed order repository.
pub struct SqliteOrderRepository<'a> {
    pub(crate) conn: &'a mut SqliteConnection,
}

/// All orders of a user, oldest first.
pub(crate) async fn fetch_orders_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> DbResult<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY order_id",
        column_list(ORDER_COLUMNS)
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(conn).await?;
    rows.iter().map(|r| order_from_row(r, "")).collect()
}

/// Raw association rows of one order, by product id.
pub(crate) async fn fetch_order_products(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> DbResult<Vec<OrderProduct>> {
    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        "SELECT order_id, product_id, quantity FROM order_products \
         WHERE order_id = ? ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(order_id, product_id, quantity)| OrderProduct {
            order_id,
            product_id,
            quantity,
        })
        .collect())
}

impl<'a> OrderRepository for SqliteOrderRepository<'a> {
    async fn create(&mut self, user_id: i64) -> DbResult<Order> {
        let mut tx = self.conn.begin().await?;

        let sql = format!(
            "INSERT INTO orders (user_id) VALUES (?) RETURNING {}",
            column_list(ORDER_COLUMNS)
        );
        let row = sqlx::query(&sql).bind(user_id).fetch_one(&mut *tx).await?;
        let order = order_from_row(&row, "")?;

        tx.commit().await?;

        debug!(order_id = order.order_id, user_id, "order created");
        Ok(order)
    }

    async fn get(&mut self, order_id: i64) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE order_id = ?",
            column_list(ORDER_COLUMNS)
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(|r| order_from_row(&r, "")).transpose()
    }

    async fn list_for_user(&mut self, user_id: i64) -> DbResult<Vec<Order>> {
        fetch_orders_for_user(&mut *self.conn, user_id).await
    }

    async fn add_line(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<OrderProduct> {
        let mut tx = self.conn.begin().await?;

        sqlx::query("INSERT INTO order_products (order_id, product_id, quantity) VALUES (?, ?, ?)")
            .bind(order_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id, product_id, quantity, "order line added");
        Ok(OrderProduct {
            order_id,
            product_id,
            quantity,
        })
    }

    async fn add_lines(
        &mut self,
        order_id: i64,
        items: &[LineItem],
    ) -> DbResult<Vec<OrderProduct>> {
        if items.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self.conn.begin().await?;
        let mut added = Vec::with_capacity(items.len());

        for item in items {
            sqlx::query(
                "INSERT INTO order_products (order_id, product_id, quantity) VALUES (?, ?, ?)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            added.push(OrderProduct {
                order_id,
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        tx.commit().await?;

        debug!(order_id, lines = added.len(), "order lines added");
        Ok(added)
    }

    async fn lines(&mut self, order_id: i64) -> DbResult<Vec<OrderLine>> {
        let sql = format!(
            "SELECT op.quantity, {} FROM order_products op \
             JOIN products p ON p.product_id = op.product_id \
             WHERE op.order_id = ? ORDER BY p.product_id",
            prefixed_columns("p", PRODUCT_COLUMNS, "p_")
        );
        let rows = sqlx::query(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderLine {
                    product: product_from_row(row, "p_")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn delete(&mut self, order_id: i64) -> DbResult<bool> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query("DELETE FROM orders WHERE order_id = ?")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id, removed = result.rows_affected(), "order deleted");
        Ok(result.rows_affected() > 0)
    }
}
