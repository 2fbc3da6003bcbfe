//! SQLite ProductRepository implementation.

use sqlx::{Connection, SqliteConnection};
use tracing::debug;

use super::helpers::{PRODUCT_COLUMNS, column_list, product_from_row};
use crate::db::{DbResult, NewProduct, Product, ProductRepository};

/// SQLx-backed product repository.
pub struct SqliteProductRepository<'a> {
    pub(crate) conn: &'a mut SqliteConnection,
}

fn insert_sql() -> String {
    format!(
        "INSERT INTO products (title, description, price) VALUES (?, ?, ?) RETURNING {}",
        column_list(PRODUCT_COLUMNS)
    )
}

pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> DbResult<Option<Product>> {
    let sql = format!(
        "SELECT {} FROM products WHERE product_id = ?",
        column_list(PRODUCT_COLUMNS)
    );
    let row = sqlx::query(&sql)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;

    row.map(|r| product_from_row(&r, "")).transpose()
}

impl<'a> ProductRepository for SqliteProductRepository<'a> {
    async fn create(&mut self, product: &NewProduct) -> DbResult<Product> {
        let mut tx = self.conn.begin().await?;

        let row = sqlx::query(&insert_sql())
            .bind(&product.title)
            .bind(&product.description)
            .bind(product.price.units())
            .fetch_one(&mut *tx)
            .await?;
        let created = product_from_row(&row, "")?;

        tx.commit().await?;

        debug!(product_id = created.product_id, "product created");
        Ok(created)
    }

    async fn create_many(&mut self, products: &[NewProduct]) -> DbResult<Vec<Product>> {
        if products.is_empty() {
            return Ok(vec![]);
        }

        let sql = insert_sql();
        let mut tx = self.conn.begin().await?;
        let mut created = Vec::with_capacity(products.len());

        for product in products {
            let row = sqlx::query(&sql)
                .bind(&product.title)
                .bind(&product.description)
                .bind(product.price.units())
                .fetch_one(&mut *tx)
                .await?;
            created.push(product_from_row(&row, "")?);
        }

        tx.commit().await?;

        debug!(count = created.len(), "products created");
        Ok(created)
    }

    async fn get(&mut self, product_id: i64) -> DbResult<Option<Product>> {
        fetch_product(&mut *self.conn, product_id).await
    }

    async fn list(&mut self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products ORDER BY product_id",
            column_list(PRODUCT_COLUMNS)
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *self.conn).await?;

        rows.iter().map(|r| product_from_row(r, "")).collect()
    }

    async fn delete(&mut self, product_id: i64) -> DbResult<bool> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query("DELETE FROM products WHERE product_id = ?")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(product_id, removed = result.rows_affected(), "product deleted");
        Ok(result.rows_affected() > 0)
    }
}
