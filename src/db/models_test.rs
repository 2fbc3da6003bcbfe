//! Tests for domain models.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::db::models::*;
use crate::db::{DbError, Product};

#[test]
fn price_normalizes_to_four_fractional_digits() {
    let price = Price::from_str("19.9").unwrap();
    assert_eq!(price.to_string(), "19.9000");
    assert_eq!(price.units(), 199_000);
}

#[test]
fn price_rounds_half_to_even() {
    assert_eq!(Price::from_str("0.00005").unwrap().units(), 0);
    assert_eq!(Price::from_str("0.00015").unwrap().units(), 2);
    assert_eq!(Price::from_str("1.23456").unwrap().units(), 12_346);
}

#[test]
fn price_rejects_more_than_sixteen_digits() {
    let err = Price::from_str("1000000000000").unwrap_err();
    assert!(matches!(err, DbError::InvalidData { .. }));

    // 12 integer digits + 4 fractional digits is the maximum
    let max = Price::from_str("999999999999.9999").unwrap();
    assert_eq!(max.units(), 9_999_999_999_999_999);
}

#[test]
fn price_rejects_garbage() {
    assert!(Price::from_str("twelve").is_err());
}

#[test]
fn price_units_roundtrip_through_storage() {
    let price = Price::from_units(123_4500);
    assert_eq!(price.amount(), Decimal::from_str("123.4500").unwrap());
    assert_eq!(Price::from_units(price.units()), price);
}

#[test]
fn price_deserializes_from_string_and_number() {
    let from_str: Price = serde_json::from_str("\"5.25\"").unwrap();
    let from_num: Price = serde_json::from_str("5.25").unwrap();
    assert_eq!(from_str, from_num);
    assert_eq!(from_str.units(), 52_500);
}

#[test]
fn new_product_list_deserializes_without_description() {
    let json = r#"[{"title": "mug", "price": "7.5"}, {"title": "cap", "description": "red", "price": 12}]"#;
    let products: Vec<NewProduct> = serde_json::from_str(json).unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].description, None);
    assert_eq!(products[1].description.as_deref(), Some("red"));
    assert_eq!(products[1].price.units(), 120_000);
}

#[test]
fn user_query_builder_sets_page_and_filters() {
    let query = UserQuery::new()
        .filter(UserFilter::any([
            UserFilter::eq(UserField::LanguageCode, "en"),
            UserFilter::eq(UserField::LanguageCode, "uk"),
        ]))
        .filter(UserFilter::like(UserField::UserName, "%john%"))
        .order_by(UserField::CreatedAt, SortOrder::Desc)
        .limit(10);

    assert_eq!(query.filters.len(), 2);
    assert_eq!(query.page.sort_by.as_deref(), Some("created_at"));
    assert_eq!(query.page.sort_order, Some(SortOrder::Desc));
    assert_eq!(query.page.limit, Some(10));
    assert_eq!(query.page.offset, None);
}

#[test]
fn sort_order_parses_case_insensitively() {
    assert_eq!(SortOrder::from_str("DESC").unwrap(), SortOrder::Desc);
    assert_eq!(SortOrder::from_str("asc").unwrap(), SortOrder::Asc);
    assert!(SortOrder::from_str("sideways").is_err());
}

#[test]
fn new_user_builder_sets_optional_fields() {
    let user = NewUser::new(2, "Jane Doe", "en")
        .user_name("janedoe")
        .referrer(1);
    assert_eq!(user.user_name.as_deref(), Some("janedoe"));
    assert_eq!(user.referrer_id, Some(1));
}

#[test]
fn product_serializes_price_as_string() {
    let product = Product {
        product_id: 1,
        title: "mug".to_string(),
        description: None,
        price: Price::from_units(75_000),
        created_at: chrono::NaiveDateTime::default(),
        updated_at: chrono::NaiveDateTime::default(),
    };
    let json = serde_json::to_value(&product).unwrap();
    assert_eq!(json["price"], "7.5000");
}
