use std::fs;

use crate::cli::commands::product::*;
use crate::cli::error::CliError;
use crate::db::{Database, NewProduct, Price, SqliteDatabase, SqliteSession};

async fn setup() -> (SqliteDatabase, SqliteSession) {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");
    let session = db.session().await.expect("Failed to open session");
    (db, session)
}

#[test]
fn test_parse_products_accepts_strings_and_numbers() {
    let products = parse_products(
        r#"[{"title": "Tea", "price": "4.20"}, {"title": "Mug", "price": 8, "description": "Blue"}]"#,
    )
    .unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].price.to_string(), "4.2000");
    assert_eq!(products[1].description.as_deref(), Some("Blue"));
}

#[test]
fn test_parse_products_rejects_bad_json() {
    let result = parse_products(r#"{"title": "not an array"}"#);
    assert!(matches!(result, Err(CliError::InvalidJson { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_and_list_products() {
    let (_db, mut session) = setup().await;

    let empty = list_products(&mut session, "table").await.unwrap();
    assert_eq!(empty, "No products found.");

    let output = add_product(
        &mut session,
        &NewProduct::new("Teapot", "19.9".parse::<Price>().unwrap()).description("Cast iron"),
    )
    .await
    .unwrap();
    assert!(output.contains("Teapot"));
    assert!(output.contains("19.9000"));

    let table = list_products(&mut session, "table").await.unwrap();
    assert!(table.contains("Cast iron"));

    let json = list_products(&mut session, "json").await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["price"], "19.9000");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_import_products_from_file() {
    let (_db, mut session) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products.json");
    fs::write(
        &path,
        r#"[{"title": "A", "price": "1"}, {"title": "B", "price": "2.5"}]"#,
    )
    .unwrap();

    let output = import_products(&mut session, &path, "table").await.unwrap();
    assert_eq!(output, "✓ Imported 2 products");

    let json = list_products(&mut session, "json").await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_import_missing_file_is_io_error() {
    let (_db, mut session) = setup().await;
    let dir = tempfile::tempdir().unwrap();

    let result = import_products(&mut session, &dir.path().join("nope.json"), "table").await;
    assert!(matches!(result, Err(CliError::Io { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_missing_product() {
    let (_db, mut session) = setup().await;

    let result = delete_product(&mut session, 12).await;
    assert!(matches!(
        result,
        Err(CliError::NotFound {
            entity: "Product",
            ..
        })
    ));
}
