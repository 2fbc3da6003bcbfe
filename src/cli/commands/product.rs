use std::path::Path;

use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{apply_table_style, format_optional, truncate_with_ellipsis};
use crate::db::{NewProduct, Product, ProductRepository, Session};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ProductDisplay {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Price")]
    price: String,
}

impl From<&Product> for ProductDisplay {
    fn from(product: &Product) -> Self {
        Self {
            id: product.product_id,
            title: truncate_with_ellipsis(&product.title, 40),
            description: format_optional(
                product
                    .description
                    .as_deref()
                    .map(|d| truncate_with_ellipsis(d, 50)),
            ),
            price: product.price.to_string(),
        }
    }
}

fn format_table(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products found.".to_string();
    }

    let display: Vec<ProductDisplay> = products.iter().map(|p| p.into()).collect();
    let mut table = Table::new(display);
    apply_table_style(&mut table);
    table.to_string()
}

/// Create a single product
pub async fn add_product<S: Session>(session: &mut S, product: &NewProduct) -> CliResult<String> {
    let created = session.products().create(product).await?;
    Ok(format!(
        "✓ Created product: {} ({}) at {}",
        created.title, created.product_id, created.price
    ))
}

/// Parse a JSON array of products
pub fn parse_products(json: &str) -> CliResult<Vec<NewProduct>> {
    let products: Vec<NewProduct> = serde_json::from_str(json)?;
    Ok(products)
}

/// Create every product of a JSON file in one transaction
pub async fn import_products<S: Session>(
    session: &mut S,
    path: &Path,
    format: &str,
) -> CliResult<String> {
    let json = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let products = parse_products(&json)?;
    let created = session.products().create_many(&products).await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&created)?),
        _ => Ok(format!("✓ Imported {} products", created.len())),
    }
}

/// List all products
pub async fn list_products<S: Session>(session: &mut S, format: &str) -> CliResult<String> {
    let products = session.products().list().await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&products)?),
        _ => Ok(format_table(&products)),
    }
}

/// Delete a product that no order references
pub async fn delete_product<S: Session>(session: &mut S, id: i64) -> CliResult<String> {
    if session.products().delete(id).await? {
        Ok(format!("✓ Deleted product: {}", id))
    } else {
        Err(CliError::NotFound {
            entity: "Product",
            id,
        })
    }
}
