//! Declared schema and drift detection.
//!
//! `schema()` describes the tables the repositories expect. `diff` compares
//! that description with what `sqlite_master` reports for a live database.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Type and constraints as written after the column name.
    pub definition: &'static str,
}

impl ColumnSpec {
    fn has(&self, keyword: &str) -> bool {
        self.definition.to_ascii_uppercase().contains(keyword)
    }

    /// First token after `DEFAULT`, if any.
    fn default_expr(&self) -> Option<String> {
        let upper = self.definition.to_ascii_uppercase();
        let mut tokens = upper.split_whitespace();
        tokens.find(|t| *t == "DEFAULT")?;
        tokens.next().map(str::to_string)
    }

    /// Whether `ALTER TABLE ... ADD COLUMN` accepts this column on a table
    /// that already has rows.
    pub fn can_add_in_place(&self) -> bool {
        if self.has("PRIMARY KEY") || self.has("UNIQUE") {
            return false;
        }
        match self.default_expr() {
            Some(expr) => {
                let constant = !expr.starts_with('(') && !expr.starts_with("CURRENT_");
                constant && !self.has("REFERENCES")
            }
            None => !self.has("NOT NULL"),
        }
    }

    /// Whether existing rows get a value when the column is introduced.
    pub fn can_fill(&self) -> bool {
        self.default_expr().is_some()
            || !self.has("NOT NULL")
            || self
                .definition
                .to_ascii_uppercase()
                .starts_with("INTEGER PRIMARY KEY")
    }

    /// Whether `ALTER TABLE ... DROP COLUMN` can remove this column.
    pub fn can_drop_in_place(&self) -> bool {
        !(self.has("PRIMARY KEY") || self.has("UNIQUE") || self.has("REFERENCES"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexSpec {
    pub fn create_sql(&self, table: &str) -> String {
        format!(
            "CREATE INDEX {} ON {} ({});",
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Table-level constraints such as composite keys.
    pub constraints: &'static [&'static str],
    pub indexes: &'static [IndexSpec],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn create_sql(&self) -> String {
        create_table_sql(self.name, self.columns.iter(), self.constraints.iter().copied())
    }
}

fn create_table_sql<'a>(
    name: &str,
    columns: impl Iterator<Item = &'a ColumnSpec>,
    constraints: impl Iterator<Item = &'a str>,
) -> String {
    let lines: Vec<String> = columns
        .map(|c| format!("    {} {}", c.name, c.definition))
        .chain(constraints.map(|c| format!("    {}", c)))
        .collect();
    format!("CREATE TABLE {} (\n{}\n);", name, lines.join(",\n"))
}

/// True when `sql` names `ident` as a whole identifier.
fn mentions(sql: &str, ident: &str) -> bool {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == ident)
}

/// Replace a table by a copy with `columns`, keeping the rows of `copied`.
///
/// SQLite cannot change a column in place, so the table is recreated under a
/// temporary name, filled, swapped in and re-indexed.
fn rebuild_sql(
    table: &str,
    columns: &[&ColumnSpec],
    constraints: &[&str],
    indexes: &[&IndexSpec],
    copied: &[&str],
) -> String {
    let temp = format!("{}_rebuild", table);
    let copied = copied.join(", ");

    let mut statements = vec![
        create_table_sql(&temp, columns.iter().copied(), constraints.iter().copied()),
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {};",
            temp, copied, copied, table
        ),
        format!("DROP TABLE {};", table),
        format!("ALTER TABLE {} RENAME TO {};", temp, table),
    ];
    statements.extend(indexes.iter().map(|i| i.create_sql(table)));
    statements.join("\n")
}

fn script(statements: &[String], rebuilds: bool) -> String {
    if rebuilds {
        without_foreign_keys(statements)
    } else {
        format!("{}\n", statements.join("\n\n"))
    }
}

/// Run `statements` outside the migration transaction with foreign keys off,
/// which a table rebuild needs so dropping a parent does not cascade.
fn without_foreign_keys(statements: &[String]) -> String {
    format!(
        "-- no-transaction\nPRAGMA foreign_keys = OFF;\nBEGIN;\n\n{}\n\nCOMMIT;\nPRAGMA foreign_keys = ON;\n",
        statements.join("\n\n")
    )
}

const fn col(name: &'static str, definition: &'static str) -> ColumnSpec {
    ColumnSpec { name, definition }
}

const fn index(name: &'static str, columns: &'static [&'static str]) -> IndexSpec {
    IndexSpec { name, columns }
}

const TIMESTAMP: &str = "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP";

static TABLES: &[TableSpec] = &[
    TableSpec {
        name: "users",
        columns: &[
            col("id", "INTEGER PRIMARY KEY NOT NULL"),
            col("full_name", "VARCHAR(255) NOT NULL"),
            col("user_name", "VARCHAR(255)"),
            col("language_code", "VARCHAR(10) NOT NULL"),
            col(
                "referrer_id",
                "INTEGER REFERENCES users (id) ON DELETE SET NULL",
            ),
            col("created_at", TIMESTAMP),
            col("updated_at", TIMESTAMP),
        ],
        constraints: &[],
        indexes: &[index("idx_users_referrer_id", &["referrer_id"])],
    },
    TableSpec {
        name: "orders",
        columns: &[
            col("order_id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            col(
                "user_id",
                "INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE",
            ),
            col("created_at", TIMESTAMP),
            col("updated_at", TIMESTAMP),
        ],
        constraints: &[],
        indexes: &[index("idx_orders_user_id", &["user_id"])],
    },
    TableSpec {
        name: "products",
        columns: &[
            col("product_id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            col("title", "VARCHAR(255) NOT NULL"),
            col("description", "VARCHAR(3000)"),
            col("price", "INTEGER NOT NULL"),
            col("created_at", TIMESTAMP),
            col("updated_at", TIMESTAMP),
        ],
        constraints: &[],
        indexes: &[],
    },
    TableSpec {
        name: "order_products",
        columns: &[
            col(
                "order_id",
                "INTEGER NOT NULL REFERENCES orders (order_id) ON DELETE CASCADE",
            ),
            col(
                "product_id",
                "INTEGER NOT NULL REFERENCES products (product_id) ON DELETE RESTRICT",
            ),
            col("quantity", "INTEGER NOT NULL"),
        ],
        constraints: &["PRIMARY KEY (order_id, product_id)"],
        indexes: &[index("idx_order_products_product_id", &["product_id"])],
    },
];

/// Tables the repositories read and write, in dependency order.
pub fn schema() -> &'static [TableSpec] {
    TABLES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

/// Differences between a declared schema and a live database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<ColumnRef>,
    /// Live tables the declaration does not mention. Reported, never dropped.
    pub unexpected_tables: Vec<String>,
    /// Live columns of declared tables that the declaration does not mention.
    pub unexpected_columns: Vec<ColumnRef>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
            && self.unexpected_tables.is_empty()
            && self.unexpected_columns.is_empty()
    }

    /// Whether anything declared is absent from the database.
    pub fn has_missing(&self) -> bool {
        !self.missing_tables.is_empty() || !self.missing_columns.is_empty()
    }

    fn is_missing(&self, table: &str, column: &str) -> bool {
        self.missing_columns
            .iter()
            .any(|c| c.table == table && c.column == column)
    }

    /// Up and down scripts that add what is missing and take it away again.
    ///
    /// Columns that `ADD COLUMN` cannot introduce on a populated table are
    /// added by rebuilding the table. A missing `NOT NULL` column without a
    /// default has no value for existing rows and is refused.
    pub fn to_sql(&self, tables: &[TableSpec]) -> DbResult<(String, String)> {
        let mut up = vec![];
        let mut down = vec![];
        let mut up_rebuilds = false;
        let mut down_rebuilds = false;

        for table in tables {
            if self.missing_tables.iter().any(|t| t == table.name) {
                let mut create = vec![table.create_sql()];
                create.extend(table.indexes.iter().map(|i| i.create_sql(table.name)));
                up.push(create.join("\n"));
                down.push(format!("DROP TABLE IF EXISTS {};", table.name));
                continue;
            }

            let (missing, present): (Vec<&ColumnSpec>, Vec<&ColumnSpec>) = table
                .columns
                .iter()
                .partition(|c| self.is_missing(table.name, c.name));
            if missing.is_empty() {
                continue;
            }

            if let Some(column) = missing.iter().find(|c| !c.can_fill()) {
                return Err(DbError::Migration {
                    message: format!(
                        "column {}.{} is NOT NULL without a default, so existing rows have no value for it; write this migration by hand",
                        table.name, column.name
                    ),
                });
            }

            let rebuild_up = !missing.iter().all(|c| c.can_add_in_place());
            let rebuild_down = !missing.iter().all(|c| c.can_drop_in_place());
            if rebuild_up || rebuild_down {
                if let Some(extra) = self.unexpected_columns.iter().find(|c| c.table == table.name) {
                    return Err(DbError::Migration {
                        message: format!(
                            "rebuilding {} would drop column {}, which the declared schema does not have",
                            table.name, extra.column
                        ),
                    });
                }
            }

            let present_names: Vec<&str> = present.iter().map(|c| c.name).collect();

            if !rebuild_up {
                let mut added: Vec<String> = missing
                    .iter()
                    .map(|c| {
                        format!(
                            "ALTER TABLE {} ADD COLUMN {} {};",
                            table.name, c.name, c.definition
                        )
                    })
                    .collect();
                added.extend(
                    table
                        .indexes
                        .iter()
                        .filter(|i| missing.iter().any(|c| i.columns.contains(&c.name)))
                        .map(|i| i.create_sql(table.name)),
                );
                up.push(added.join("\n"));
            } else {
                let columns: Vec<&ColumnSpec> = table.columns.iter().collect();
                let indexes: Vec<&IndexSpec> = table.indexes.iter().collect();
                up.push(rebuild_sql(
                    table.name,
                    &columns,
                    table.constraints,
                    &indexes,
                    &present_names,
                ));
                up_rebuilds = true;
            }

            if !rebuild_down {
                let mut dropped = vec![];
                for column in &missing {
                    for index in table.indexes.iter().filter(|i| i.columns.contains(&column.name)) {
                        dropped.push(format!("DROP INDEX IF EXISTS {};", index.name));
                    }
                    dropped.push(format!(
                        "ALTER TABLE {} DROP COLUMN {};",
                        table.name, column.name
                    ));
                }
                down.push(dropped.join("\n"));
            } else {
                let keeps = |sql: &str| !missing.iter().any(|c| mentions(sql, c.name));
                let constraints: Vec<&str> =
                    table.constraints.iter().copied().filter(|c| keeps(*c)).collect();
                let indexes: Vec<&IndexSpec> = table
                    .indexes
                    .iter()
                    .filter(|i| !missing.iter().any(|c| i.columns.contains(&c.name)))
                    .collect();
                down.push(rebuild_sql(
                    table.name,
                    &present,
                    &constraints,
                    &indexes,
                    &present_names,
                ));
                down_rebuilds = true;
            }
        }

        // Undo in the opposite order so dependents go first
        down.reverse();

        Ok((script(&up, up_rebuilds), script(&down, down_rebuilds)))
    }
}

/// Compare `tables` with the live schema behind `pool`.
pub async fn diff(pool: &SqlitePool, tables: &[TableSpec]) -> DbResult<SchemaDiff> {
    let live: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();

    let mut result = SchemaDiff::default();

    for table in tables {
        if !live_set.contains(table.name) {
            result.missing_tables.push(table.name.to_string());
            continue;
        }

        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(table.name)
            .fetch_all(pool)
            .await?;
        for spec in table.columns {
            if !columns.iter().any(|c| c == spec.name) {
                result.missing_columns.push(ColumnRef {
                    table: table.name.to_string(),
                    column: spec.name.to_string(),
                });
            }
        }
        for column in &columns {
            if table.column(column).is_none() {
                result.unexpected_columns.push(ColumnRef {
                    table: table.name.to_string(),
                    column: column.clone(),
                });
            }
        }
    }

    result.unexpected_tables = live
        .iter()
        .filter(|name| !tables.iter().any(|t| t.name == name.as_str()))
        .cloned()
        .collect();

    if !result.is_empty() {
        warn!(
            missing_tables = ?result.missing_tables,
            missing_columns = result.missing_columns.len(),
            unexpected_tables = ?result.unexpected_tables,
            unexpected_columns = result.unexpected_columns.len(),
            "schema drift detected"
        );
    }

    Ok(result)
}
