use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{apply_table_style, format_timestamp, truncate_with_ellipsis};
use crate::db::{OrderDetail, OrderLine, OrderRepository, Session};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct LineDisplay {
    #[tabled(rename = "Product")]
    product_id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Qty")]
    quantity: i64,
    #[tabled(rename = "Price")]
    price: String,
}

impl From<&OrderLine> for LineDisplay {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product.product_id,
            title: truncate_with_ellipsis(&line.product.title, 40),
            quantity: line.quantity,
            price: line.product.price.to_string(),
        }
    }
}

/// Create an empty order
pub async fn create_order<S: Session>(session: &mut S, user_id: i64) -> CliResult<String> {
    let order = session.orders().create(user_id).await?;
    Ok(format!(
        "✓ Created order {} for user {}",
        order.order_id, order.user_id
    ))
}

/// Add a product line to an order
pub async fn add_line<S: Session>(
    session: &mut S,
    order_id: i64,
    product_id: i64,
    quantity: i64,
) -> CliResult<String> {
    if quantity <= 0 {
        return Err(CliError::InvalidInput {
            message: format!("quantity must be positive, got {}", quantity),
        });
    }

    session
        .orders()
        .add_line(order_id, product_id, quantity)
        .await?;
    Ok(format!(
        "✓ Added {} x product {} to order {}",
        quantity, product_id, order_id
    ))
}

/// Show an order with its lines
pub async fn show_order<S: Session>(
    session: &mut S,
    order_id: i64,
    format: &str,
) -> CliResult<String> {
    let order = session
        .orders()
        .get(order_id)
        .await?
        .ok_or(CliError::NotFound {
            entity: "Order",
            id: order_id,
        })?;
    let lines = session.orders().lines(order_id).await?;
    let detail = OrderDetail { order, lines };

    match format {
        "json" => Ok(serde_json::to_string_pretty(&detail)?),
        _ => Ok(format_order_detail(&detail)),
    }
}

fn format_order_detail(detail: &OrderDetail) -> String {
    let header = format!(
        "Order {} (user {}, created {})",
        detail.order.order_id,
        detail.order.user_id,
        format_timestamp(&detail.order.created_at)
    );

    if detail.lines.is_empty() {
        return format!("{}\nNo lines.", header);
    }

    let display: Vec<LineDisplay> = detail.lines.iter().map(|l| l.into()).collect();
    let mut table = Table::new(display);
    apply_table_style(&mut table);
    format!("{}\n{}", header, table)
}

/// Delete an order and its lines
pub async fn delete_order<S: Session>(session: &mut S, order_id: i64) -> CliResult<String> {
    if session.orders().delete(order_id).await? {
        Ok(format!("✓ Deleted order: {}", order_id))
    } else {
        Err(CliError::NotFound {
            entity: "Order",
            id: order_id,
        })
    }
}
