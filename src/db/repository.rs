//! Repository traits for data access abstraction.
//!
//! These traits define the contract for data access, allowing different
//! storage backends to be swapped without changing business logic. A
//! repository borrows its session's connection, so `&mut self` on every
//! method keeps one session from being driven by two callers at once.

use crate::db::{
    DbResult,
    models::{
        LineItem, NewProduct, NewUser, Order, OrderLine, OrderLineRow, OrderProduct,
        OrderWithUser, Product, Referral, User, UserOrderCount, UserOrders, UserQuantityTotal,
        UserQuery,
    },
};

/// Repository for User operations.
#[allow(async_fn_in_trait)]
pub trait UserRepository {
    /// Insert a user, or update `full_name`/`user_name` if the id exists.
    async fn create(&mut self, user: &NewUser) -> DbResult<User>;

    /// Get a user by ID.
    async fn get(&mut self, id: i64) -> DbResult<Option<User>>;

    /// Get only the language code of a user.
    async fn language(&mut self, id: i64) -> DbResult<Option<String>>;

    /// List users matching a query (all users when `None`).
    async fn list(&mut self, query: Option<&UserQuery>) -> DbResult<Vec<User>>;

    /// Point the user at a new referrer (or clear it). Fails with
    /// `NotFound` when the user does not exist.
    async fn set_referrer(&mut self, user_id: i64, referrer_id: Option<i64>) -> DbResult<User>;

    /// Delete a user by ID. Returns whether a row was removed.
    async fn delete(&mut self, id: i64) -> DbResult<bool>;

    /// Delete every user, returning how many rows were removed.
    async fn delete_all(&mut self) -> DbResult<u64>;
}

/// Repository for Order and line item operations.
#[allow(async_fn_in_trait)]
pub trait OrderRepository {
    /// Create an empty order for a user.
    async fn create(&mut self, user_id: i64) -> DbResult<Order>;

    /// Get an order by ID.
    async fn get(&mut self, order_id: i64) -> DbResult<Option<Order>>;

    /// Get all orders of a user.
    async fn list_for_user(&mut self, user_id: i64) -> DbResult<Vec<Order>>;

    /// Add one product line to an order.
    async fn add_line(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<OrderProduct>;

    /// Add several product lines to an order atomically.
    async fn add_lines(&mut self, order_id: i64, items: &[LineItem])
    -> DbResult<Vec<OrderProduct>>;

    /// Get the lines of an order with their products.
    async fn lines(&mut self, order_id: i64) -> DbResult<Vec<OrderLine>>;

    /// Delete an order (and its lines). Returns whether a row was removed.
    async fn delete(&mut self, order_id: i64) -> DbResult<bool>;
}

/// Repository for Product operations.
#[allow(async_fn_in_trait)]
pub trait ProductRepository {
    /// Create a new product.
    async fn create(&mut self, product: &NewProduct) -> DbResult<Product>;

    /// Create many products in one transaction; none persist on failure.
    async fn create_many(&mut self, products: &[NewProduct]) -> DbResult<Vec<Product>>;

    /// Get a product by ID.
    async fn get(&mut self, product_id: i64) -> DbResult<Option<Product>>;

    /// Get all products.
    async fn list(&mut self) -> DbResult<Vec<Product>>;

    /// Delete a product. Rejected while any order line references it.
    async fn delete(&mut self, product_id: i64) -> DbResult<bool>;
}

/// Aggregates and joined reads across the schema.
#[allow(async_fn_in_trait)]
pub trait ReportRepository {
    /// Number of orders placed by one user.
    async fn order_count(&mut self, user_id: i64) -> DbResult<i64>;

    /// Number of orders per user.
    async fn order_counts(&mut self) -> DbResult<Vec<UserOrderCount>>;

    /// Sum of ordered quantities per user, keeping only sums strictly
    /// greater than `min` when given.
    async fn quantity_totals(&mut self, min: Option<i64>) -> DbResult<Vec<UserQuantityTotal>>;

    /// Orders of a user joined with the user row.
    async fn orders_with_user(&mut self, user_id: i64) -> DbResult<Vec<OrderWithUser>>;

    /// Every line of every order of a user, in a single query.
    async fn user_order_lines(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>>;

    /// Same rows as `user_order_lines`, fetched with one query per parent row.
    async fn user_order_lines_per_row(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>>;

    /// Users paired with the user who referred them.
    async fn referrals(&mut self) -> DbResult<Vec<Referral>>;

    /// Every user with their orders and lines, loaded in a single query.
    async fn users_with_orders(&mut self) -> DbResult<Vec<UserOrders>>;
}

/// A unit of work holding one connection.
pub trait Session {
    type Users<'a>: UserRepository
    where
        Self: 'a;
    type Orders<'a>: OrderRepository
    where
        Self: 'a;
    type Products<'a>: ProductRepository
    where
        Self: 'a;
    type Reports<'a>: ReportRepository
    where
        Self: 'a;

    /// Get the user repository.
    fn users(&mut self) -> Self::Users<'_>;

    /// Get the order repository.
    fn orders(&mut self) -> Self::Orders<'_>;

    /// Get the product repository.
    fn products(&mut self) -> Self::Products<'_>;

    /// Get the report repository.
    fn reports(&mut self) -> Self::Reports<'_>;
}

/// Combined database interface.
#[allow(async_fn_in_trait)]
pub trait Database: Send + Sync {
    type Session: Session;

    /// Run pending migrations, returning how many were applied.
    async fn migrate(&self) -> DbResult<usize>;

    /// Acquire a session. The connection is released when it is dropped.
    async fn session(&self) -> DbResult<Self::Session>;
}
