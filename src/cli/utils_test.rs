use crate::cli::utils::*;
use chrono::NaiveDate;

#[test]
fn test_truncate_with_ellipsis_short_string() {
    let result = truncate_with_ellipsis("hello", 10);
    assert_eq!(result, "hello");
}

#[test]
fn test_truncate_with_ellipsis_exact_length() {
    let result = truncate_with_ellipsis("hello", 5);
    assert_eq!(result, "hello");
}

#[test]
fn test_truncate_with_ellipsis_long_string() {
    let result = truncate_with_ellipsis("a very long product description", 10);
    assert_eq!(result, "a very ...");
}

#[test]
fn test_truncate_with_ellipsis_unicode() {
    let result = truncate_with_ellipsis("чай зелений", 11);
    assert_eq!(result, "чай зелений");

    let result = truncate_with_ellipsis("чай зелений", 7);
    assert_eq!(result, "чай ...");
}

#[test]
fn test_format_optional() {
    assert_eq!(format_optional::<&str>(None), "-");
    assert_eq!(format_optional(Some("jane")), "jane");
    assert_eq!(format_optional(Some(42)), "42");
}

#[test]
fn test_format_timestamp() {
    let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(14, 5, 59)
        .unwrap();
    assert_eq!(format_timestamp(&ts), "2024-03-09 14:05");
}

#[test]
fn test_parse_list_none() {
    assert!(parse_list(None).is_empty());
}

#[test]
fn test_parse_list_trims_and_drops_empty() {
    assert_eq!(parse_list(Some(" en, uk,,de ")), vec!["en", "uk", "de"]);
}
