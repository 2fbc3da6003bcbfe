//! SQLite UserRepository implementation.

use sqlx::{Connection, SqliteConnection};
use tracing::debug;

use super::helpers::{
    USER_COLUMNS, bind_filter_values, build_limit_offset_clause, build_order_clause,
    build_where_clause, column_list, user_from_row,
};
use crate::db::{DbError, DbResult, NewUser, User, UserQuery, UserRepository};

/// SQLx-backed user repository.
pub struct SqliteUserRepository<'a> {
    pub(crate) conn: &'a mut SqliteConnection,
}

fn reject_self_referral(user_id: i64, referrer_id: Option<i64>) -> DbResult<()> {
    if referrer_id == Some(user_id) {
        return Err(DbError::InvalidData {
            message: format!("user {} cannot refer themselves", user_id),
            help: "Choose a different referrer or leave it empty".to_string(),
        });
    }
    Ok(())
}

impl<'a> UserRepository for SqliteUserRepository<'a> {
    async fn create(&mut self, user: &NewUser) -> DbResult<User> {
        reject_self_referral(user.id, user.referrer_id)?;

        let mut tx = self.conn.begin().await?;

        // On conflict only the mutable profile fields change
        let sql = format!(
            "INSERT INTO users (id, full_name, user_name, language_code, referrer_id) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                 full_name = excluded.full_name, \
                 user_name = excluded.user_name, \
                 updated_at = CURRENT_TIMESTAMP \
             RETURNING {}",
            column_list(USER_COLUMNS)
        );

        let row = sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.user_name)
            .bind(&user.language_code)
            .bind(user.referrer_id)
            .fetch_one(&mut *tx)
            .await?;
        let created = user_from_row(&row, "")?;

        tx.commit().await?;

        debug!(user_id = created.id, "user upserted");
        Ok(created)
    }

    async fn get(&mut self, id: i64) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = ?",
            column_list(USER_COLUMNS)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(|r| user_from_row(&r, "")).transpose()
    }

    async fn language(&mut self, id: i64) -> DbResult<Option<String>> {
        let language: Option<String> =
            sqlx::query_scalar("SELECT language_code FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(language)
    }

    async fn list(&mut self, query: Option<&UserQuery>) -> DbResult<Vec<User>> {
        let default_query = UserQuery::default();
        let query = query.unwrap_or(&default_query);

        let order_clause = build_order_clause(&query.page, USER_COLUMNS, "created_at");
        let limit_clause = build_limit_offset_clause(&query.page);

        let mut bind_values = vec![];
        let where_clause = build_where_clause(&query.filters, &mut bind_values);

        // Ties broken by id so paging is stable
        let sql = format!(
            "SELECT {} FROM users {} {}, id ASC{}",
            column_list(USER_COLUMNS),
            where_clause,
            order_clause,
            limit_clause
        );
        debug!(%sql, "listing users");

        let rows = bind_filter_values(sqlx::query(&sql), &bind_values)
            .fetch_all(&mut *self.conn)
            .await?;

        rows.iter().map(|r| user_from_row(r, "")).collect()
    }

    async fn set_referrer(&mut self, user_id: i64, referrer_id: Option<i64>) -> DbResult<User> {
        reject_self_referral(user_id, referrer_id)?;

        let mut tx = self.conn.begin().await?;

        let sql = format!(
            "UPDATE users SET referrer_id = ?, updated_at = CURRENT_TIMESTAMP \
             WHERE id = ? RETURNING {}",
            column_list(USER_COLUMNS)
        );
        let row = sqlx::query(&sql)
            .bind(referrer_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let row = row.ok_or(DbError::NotFound {
            entity_type: "User".to_string(),
            id: user_id.to_string(),
        })?;
        let updated = user_from_row(&row, "")?;

        tx.commit().await?;

        debug!(user_id, ?referrer_id, "referrer updated");
        Ok(updated)
    }

    async fn delete(&mut self, id: i64) -> DbResult<bool> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(user_id = id, removed = result.rows_affected(), "user deleted");
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&mut self) -> DbResult<u64> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query("DELETE FROM users").execute(&mut *tx).await?;

        tx.commit().await?;

        debug!(removed = result.rows_affected(), "all users deleted");
        Ok(result.rows_affected())
    }
}
