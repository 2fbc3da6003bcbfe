//! Shared helper functions for SQLite repositories.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use crate::db::{
    DbResult, FilterValue, Order, PageSort, Price, Product, SortOrder, User, UserFilter,
};

pub(crate) const USER_COLUMNS: &[&str] = &[
    "id",
    "full_name",
    "user_name",
    "language_code",
    "referrer_id",
    "created_at",
    "updated_at",
];

pub(crate) const ORDER_COLUMNS: &[&str] = &["order_id", "user_id", "created_at", "updated_at"];

pub(crate) const PRODUCT_COLUMNS: &[&str] = &[
    "product_id",
    "title",
    "description",
    "price",
    "created_at",
    "updated_at",
];

/// Plain column list, e.g. for `RETURNING`.
pub fn column_list(columns: &[&str]) -> String {
    columns.join(", ")
}

/// Aliased column list for joins: `u.id AS u_id, u.full_name AS u_full_name, ...`.
pub fn prefixed_columns(alias: &str, columns: &[&str], prefix: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{alias}.{c} AS {prefix}{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a sort field against the allowed column names.
/// Returns None for invalid fields (falls back to default).
pub fn validate_sort_field(field: &str, allowed: &[&'static str]) -> Option<&'static str> {
    allowed.iter().copied().find(|&allowed_field| allowed_field == field)
}

/// Build ORDER BY clause from PageSort parameters.
pub fn build_order_clause(
    page: &PageSort,
    allowed_fields: &[&'static str],
    default_field: &str,
) -> String {
    let sort_field = page
        .sort_by
        .as_deref()
        .and_then(|f| validate_sort_field(f, allowed_fields))
        .unwrap_or(default_field);

    let order = match page.sort_order.unwrap_or(SortOrder::Asc) {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    format!("ORDER BY {} {}", sort_field, order)
}

/// Build LIMIT/OFFSET clause from PageSort parameters.
/// Note: SQL requires LIMIT when using OFFSET. If offset is provided without limit,
/// we use LIMIT -1 (SQLite's "no limit" value).
pub fn build_limit_offset_clause(page: &PageSort) -> String {
    let mut clause = String::new();

    if let Some(limit) = page.limit {
        clause.push_str(&format!(" LIMIT {}", limit));
    }

    if let Some(offset) = page.offset.filter(|o| *o > 0) {
        if page.limit.is_none() {
            clause.push_str(" LIMIT -1");
        }
        clause.push_str(&format!(" OFFSET {}", offset));
    }

    clause
}

/// Render a predicate tree as SQL, pushing bind values in placeholder order.
pub fn build_user_filter(filter: &UserFilter, binds: &mut Vec<FilterValue>) -> String {
    match filter {
        UserFilter::Eq(field, value) => {
            binds.push(value.clone());
            format!("{} = ?", field.column())
        }
        UserFilter::Gt(field, value) => {
            binds.push(value.clone());
            format!("{} > ?", field.column())
        }
        UserFilter::Like(field, pattern) => {
            binds.push(FilterValue::Text(pattern.clone()));
            format!("LOWER({}) LIKE LOWER(?)", field.column())
        }
        UserFilter::IsNull(field) => format!("{} IS NULL", field.column()),
        UserFilter::Any(filters) => join_filters(filters, " OR ", "0", binds),
        UserFilter::All(filters) => join_filters(filters, " AND ", "1", binds),
    }
}

fn join_filters(
    filters: &[UserFilter],
    separator: &str,
    empty: &str,
    binds: &mut Vec<FilterValue>,
) -> String {
    if filters.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = filters
        .iter()
        .map(|f| build_user_filter(f, binds))
        .collect();
    format!("({})", parts.join(separator))
}

/// Build a WHERE clause conjoining the top-level predicates.
pub fn build_where_clause(filters: &[UserFilter], binds: &mut Vec<FilterValue>) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = filters
        .iter()
        .map(|f| build_user_filter(f, binds))
        .collect();
    format!("WHERE {}", parts.join(" AND "))
}

/// Bind filter values onto a query in order.
pub fn bind_filter_values<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    values: &'q [FilterValue],
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for value in values {
        query = match value {
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

// =============================================================================
// Row mapping
// =============================================================================

pub(crate) fn user_from_row(row: &SqliteRow, prefix: &str) -> DbResult<User> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(User {
        id: row.try_get(col("id").as_str())?,
        full_name: row.try_get(col("full_name").as_str())?,
        user_name: row.try_get(col("user_name").as_str())?,
        language_code: row.try_get(col("language_code").as_str())?,
        referrer_id: row.try_get(col("referrer_id").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
        updated_at: row.try_get(col("updated_at").as_str())?,
    })
}

pub(crate) fn order_from_row(row: &SqliteRow, prefix: &str) -> DbResult<Order> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(Order {
        order_id: row.try_get(col("order_id").as_str())?,
        user_id: row.try_get(col("user_id").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
        updated_at: row.try_get(col("updated_at").as_str())?,
    })
}

pub(crate) fn product_from_row(row: &SqliteRow, prefix: &str) -> DbResult<Product> {
    let col = |name: &str| format!("{prefix}{name}");
    let units: i64 = row.try_get(col("price").as_str())?;
    Ok(Product {
        product_id: row.try_get(col("product_id").as_str())?,
        title: row.try_get(col("title").as_str())?,
        description: row.try_get(col("description").as_str())?,
        price: Price::from_units(units),
        created_at: row.try_get(col("created_at").as_str())?,
        updated_at: row.try_get(col("updated_at").as_str())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserField;

    #[test]
    fn test_build_order_clause_falls_back_on_unknown_field() {
        let page = PageSort {
            sort_by: Some("password".to_string()),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        assert_eq!(
            build_order_clause(&page, &["full_name", "created_at"], "created_at"),
            "ORDER BY created_at DESC"
        );
    }

    #[test]
    fn test_build_order_clause_uses_allowed_field() {
        let page = PageSort {
            sort_by: Some("full_name".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_order_clause(&page, &["full_name", "created_at"], "created_at"),
            "ORDER BY full_name ASC"
        );
    }

    #[test]
    fn test_build_limit_offset_clause() {
        let mut page = PageSort::default();
        assert_eq!(build_limit_offset_clause(&page), "");

        page.limit = Some(10);
        assert_eq!(build_limit_offset_clause(&page), " LIMIT 10");

        page.offset = Some(5);
        assert_eq!(build_limit_offset_clause(&page), " LIMIT 10 OFFSET 5");

        page.limit = None;
        assert_eq!(build_limit_offset_clause(&page), " LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_build_where_clause_nests_disjunction_inside_conjunction() {
        let filters = vec![
            UserFilter::any([
                UserFilter::eq(UserField::LanguageCode, "en"),
                UserFilter::eq(UserField::LanguageCode, "uk"),
            ]),
            UserFilter::like(UserField::UserName, "%john%"),
            UserFilter::gt(UserField::Id, 0),
        ];
        let mut binds = vec![];
        let sql = build_where_clause(&filters, &mut binds);

        assert_eq!(
            sql,
            "WHERE (language_code = ? OR language_code = ?) AND LOWER(user_name) LIKE LOWER(?) AND id > ?"
        );
        assert_eq!(
            binds,
            vec![
                FilterValue::Text("en".to_string()),
                FilterValue::Text("uk".to_string()),
                FilterValue::Text("%john%".to_string()),
                FilterValue::Int(0),
            ]
        );
    }

    #[test]
    fn test_empty_groups_render_as_constants() {
        let mut binds = vec![];
        assert_eq!(build_user_filter(&UserFilter::Any(vec![]), &mut binds), "0");
        assert_eq!(build_user_filter(&UserFilter::All(vec![]), &mut binds), "1");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_is_null_has_no_binds() {
        let mut binds = vec![];
        let sql = build_where_clause(&[UserFilter::IsNull(UserField::ReferrerId)], &mut binds);
        assert_eq!(sql, "WHERE referrer_id IS NULL");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_prefixed_columns() {
        assert_eq!(
            prefixed_columns("o", &["order_id", "user_id"], "o_"),
            "o.order_id AS o_order_id, o.user_id AS o_user_id"
        );
    }
}
