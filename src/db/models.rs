//! Domain models for the shop database.
//!
//! These models are storage-agnostic and represent the rows of the four
//! tables plus the shapes returned by joined and aggregate reads.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

// =============================================================================
// Query Types for Filtering, Pagination and Sorting
// =============================================================================

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

/// Base pagination and sorting options - composed into entity-specific queries.
#[derive(Debug, Clone, Default)]
pub struct PageSort {
    /// Maximum number of items to return.
    pub limit: Option<usize>,
    /// Number of items to skip.
    pub offset: Option<usize>,
    /// Field to sort by (validated per entity type).
    pub sort_by: Option<String>,
    /// Sort order (ascending or descending).
    pub sort_order: Option<SortOrder>,
}

/// Filterable and sortable columns of the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    FullName,
    UserName,
    LanguageCode,
    ReferrerId,
    CreatedAt,
    UpdatedAt,
}

impl UserField {
    pub fn column(&self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::FullName => "full_name",
            UserField::UserName => "user_name",
            UserField::LanguageCode => "language_code",
            UserField::ReferrerId => "referrer_id",
            UserField::CreatedAt => "created_at",
            UserField::UpdatedAt => "updated_at",
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

/// Composable predicate over users.
///
/// `Any` is a disjunction and `All` a conjunction of nested predicates, so
/// `(language = 'en' OR language = 'uk') AND user_name ILIKE '%john%'` is
/// `All([Any([Eq, Eq]), Like])`. An empty `Any` matches nothing and an empty
/// `All` matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Eq(UserField, FilterValue),
    Gt(UserField, FilterValue),
    /// Case-insensitive SQL pattern (`%` and `_` wildcards).
    Like(UserField, String),
    IsNull(UserField),
    Any(Vec<UserFilter>),
    All(Vec<UserFilter>),
}

impl UserFilter {
    pub fn eq(field: UserField, value: impl Into<FilterValue>) -> Self {
        UserFilter::Eq(field, value.into())
    }

    pub fn gt(field: UserField, value: impl Into<FilterValue>) -> Self {
        UserFilter::Gt(field, value.into())
    }

    pub fn like(field: UserField, pattern: impl Into<String>) -> Self {
        UserFilter::Like(field, pattern.into())
    }

    pub fn any(filters: impl IntoIterator<Item = UserFilter>) -> Self {
        UserFilter::Any(filters.into_iter().collect())
    }

    pub fn all(filters: impl IntoIterator<Item = UserFilter>) -> Self {
        UserFilter::All(filters.into_iter().collect())
    }
}

/// Query for Users - predicates (conjoined) + pagination.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub filters: Vec<UserFilter>,
    pub page: PageSort,
}

impl UserQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: UserFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: UserField, order: SortOrder) -> Self {
        self.page.sort_by = Some(field.column().to_string());
        self.page.sort_order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.page.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.page.offset = Some(offset);
        self
    }
}

// =============================================================================
// Fixed-point price
// =============================================================================

/// Monetary amount with precision 16 and scale 4.
///
/// Persisted as an integer count of ten-thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const SCALE: u32 = 4;
    pub const PRECISION: u32 = 16;

    /// Round to four fractional digits (half to even) and check precision.
    pub fn new(amount: Decimal) -> DbResult<Self> {
        let mut rounded =
            amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(Self::SCALE);

        if rounded.mantissa().unsigned_abs() >= 10u128.pow(Self::PRECISION) {
            return Err(DbError::InvalidData {
                message: format!("price {} exceeds {} digits", amount, Self::PRECISION),
                help: format!(
                    "Use at most {} integer digits",
                    Self::PRECISION - Self::SCALE
                ),
            });
        }

        Ok(Self(rounded))
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::new(units, Self::SCALE))
    }

    /// Value in ten-thousandths, as stored.
    pub fn units(&self) -> i64 {
        // new() bounds the mantissa below 10^16
        self.0.mantissa() as i64
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DbError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl FromStr for Price {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| DbError::InvalidData {
            message: format!("invalid price '{}': {}", s, e),
            help: "Use a decimal number such as 19.99".to_string(),
        })?;
        Price::new(amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A registered user, keyed by an externally assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub user_name: Option<String>,
    pub language_code: String,
    /// User who invited this one; cleared when the referrer is deleted.
    pub referrer_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for the user upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub id: i64,
    pub full_name: String,
    pub language_code: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub referrer_id: Option<i64>,
}

impl NewUser {
    pub fn new(id: i64, full_name: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            language_code: language_code.into(),
            user_name: None,
            referrer_id: None,
        }
    }

    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn referrer(mut self, referrer_id: i64) -> Self {
        self.referrer_id = Some(referrer_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub user_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Price,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for product inserts, single or bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
}

impl NewProduct {
    pub fn new(title: impl Into<String>, price: Price) -> Self {
        Self {
            title: title.into(),
            description: None,
            price,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Association row between an order and a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

/// Input for bulk line insertion into one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Joined and aggregate read shapes
// =============================================================================

/// A line item together with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: Product,
    pub quantity: i64,
}

/// An order together with its owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithUser {
    pub order: Order,
    pub user: User,
}

/// One (product, order, user name, quantity) tuple of a user's purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRow {
    pub product: Product,
    pub order: Order,
    pub user_name: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrderCount {
    pub user_id: i64,
    pub full_name: String,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuantityTotal {
    pub user_id: i64,
    pub full_name: String,
    pub quantity: i64,
}

/// A referrer/referral pair from the users self-join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub referrer_id: i64,
    pub referrer_name: String,
    pub referral_id: i64,
    pub referral_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// A user with every order and line item, loaded eagerly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrders {
    pub user: User,
    pub orders: Vec<OrderDetail>,
}
