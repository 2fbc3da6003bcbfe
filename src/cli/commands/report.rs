use crate::cli::error::CliResult;
use crate::cli::utils::{apply_table_style, format_optional, truncate_with_ellipsis};
use crate::db::{
    OrderLineRow, Referral, ReportRepository, Session, UserOrderCount, UserOrders,
    UserQuantityTotal,
};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct OrderCountDisplay {
    #[tabled(rename = "User")]
    user_id: i64,
    #[tabled(rename = "Name")]
    full_name: String,
    #[tabled(rename = "Orders")]
    orders: i64,
}

#[derive(Tabled)]
struct QuantityDisplay {
    #[tabled(rename = "User")]
    user_id: i64,
    #[tabled(rename = "Name")]
    full_name: String,
    #[tabled(rename = "Quantity")]
    quantity: i64,
}

#[derive(Tabled)]
struct LineRowDisplay {
    #[tabled(rename = "Order")]
    order_id: i64,
    #[tabled(rename = "Product")]
    title: String,
    #[tabled(rename = "Username")]
    user_name: String,
    #[tabled(rename = "Qty")]
    quantity: i64,
}

#[derive(Tabled)]
struct ReferralDisplay {
    #[tabled(rename = "Referrer")]
    referrer: String,
    #[tabled(rename = "Referral")]
    referral: String,
}

fn render<T: Tabled>(rows: Vec<T>, empty: &str) -> String {
    if rows.is_empty() {
        return empty.to_string();
    }
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    table.to_string()
}

/// Order count per user
pub async fn order_counts<S: Session>(session: &mut S, format: &str) -> CliResult<String> {
    let counts = session.reports().order_counts().await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&counts)?),
        _ => Ok(render(
            counts
                .iter()
                .map(|c: &UserOrderCount| OrderCountDisplay {
                    user_id: c.user_id,
                    full_name: truncate_with_ellipsis(&c.full_name, 40),
                    orders: c.orders,
                })
                .collect(),
            "No orders found.",
        )),
    }
}

/// Ordered quantity per user, optionally above a threshold
pub async fn quantity_totals<S: Session>(
    session: &mut S,
    min: Option<i64>,
    format: &str,
) -> CliResult<String> {
    let totals = session.reports().quantity_totals(min).await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&totals)?),
        _ => Ok(render(
            totals
                .iter()
                .map(|t: &UserQuantityTotal| QuantityDisplay {
                    user_id: t.user_id,
                    full_name: truncate_with_ellipsis(&t.full_name, 40),
                    quantity: t.quantity,
                })
                .collect(),
            "No users above the threshold.",
        )),
    }
}

/// Every purchased line of a user
pub async fn user_lines<S: Session>(
    session: &mut S,
    user_id: i64,
    per_row: bool,
    format: &str,
) -> CliResult<String> {
    let rows = if per_row {
        session.reports().user_order_lines_per_row(user_id).await?
    } else {
        session.reports().user_order_lines(user_id).await?
    };

    match format {
        "json" => Ok(serde_json::to_string_pretty(&rows)?),
        _ => Ok(render(
            rows.iter()
                .map(|r: &OrderLineRow| LineRowDisplay {
                    order_id: r.order.order_id,
                    title: truncate_with_ellipsis(&r.product.title, 40),
                    user_name: format_optional(r.user_name.as_deref()),
                    quantity: r.quantity,
                })
                .collect(),
            "No order lines found.",
        )),
    }
}

/// Referrer and referral pairs
pub async fn referrals<S: Session>(session: &mut S, format: &str) -> CliResult<String> {
    let pairs = session.reports().referrals().await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&pairs)?),
        _ => Ok(render(
            pairs
                .iter()
                .map(|p: &Referral| ReferralDisplay {
                    referrer: format!("{} ({})", p.referrer_name, p.referrer_id),
                    referral: format!("{} ({})", p.referral_name, p.referral_id),
                })
                .collect(),
            "No referrals found.",
        )),
    }
}

/// Users with their orders and lines as an indented tree
pub async fn order_tree<S: Session>(session: &mut S, format: &str) -> CliResult<String> {
    let tree = session.reports().users_with_orders().await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&tree)?),
        _ => Ok(format_tree(&tree)),
    }
}

fn format_tree(tree: &[UserOrders]) -> String {
    if tree.is_empty() {
        return "No users found.".to_string();
    }

    let mut out = vec![];
    for entry in tree {
        out.push(format!("{} ({})", entry.user.full_name, entry.user.id));
        if entry.orders.is_empty() {
            out.push("  (no orders)".to_string());
        }
        for detail in &entry.orders {
            out.push(format!("  order {}", detail.order.order_id));
            for line in &detail.lines {
                out.push(format!(
                    "    {} x {} @ {}",
                    line.quantity, line.product.title, line.product.price
                ));
            }
        }
    }
    out.join("\n")
}
