//! Blocking façade over the async repositories.
//!
//! `BlockingDatabase` owns a current-thread Tokio runtime and drives every
//! call to completion on it, so callers without an async runtime get the
//! same operations as plain methods. Do not call these from inside another
//! Tokio runtime.

use std::path::Path;

use tokio::runtime::{Builder, Runtime};

use crate::config::Config;
use crate::db::{
    Database, DbError, DbResult, LineItem, NewProduct, NewUser, Order, OrderLine, OrderLineRow,
    OrderProduct, OrderRepository, OrderWithUser, Product, ProductRepository, Referral,
    ReportRepository, Session, SqliteDatabase, SqliteSession, User, UserOrderCount, UserOrders,
    UserQuantityTotal, UserQuery, UserRepository,
};

fn closed() -> DbError {
    DbError::Connection {
        message: "database handle already closed".to_string(),
    }
}

/// Synchronous handle owning a runtime and a pool.
pub struct BlockingDatabase {
    // Dropped inside the runtime, see Drop
    db: Option<SqliteDatabase>,
    runtime: Runtime,
}

impl BlockingDatabase {
    pub fn connect(config: &Config) -> DbResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::Connection {
                message: format!("failed to start runtime: {}", e),
            })?;
        let db = runtime.block_on(SqliteDatabase::connect(config))?;
        Ok(Self {
            db: Some(db),
            runtime,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::connect(&Config::default().with_db_path(path))
    }

    pub fn in_memory() -> DbResult<Self> {
        Self::connect(&Config::in_memory())
    }

    fn db(&self) -> DbResult<&SqliteDatabase> {
        self.db.as_ref().ok_or_else(closed)
    }

    /// Apply pending migrations, returning how many ran.
    pub fn migrate(&self) -> DbResult<usize> {
        self.runtime.block_on(self.db()?.migrate())
    }

    /// Acquire one pooled connection for a unit of work.
    pub fn session(&self) -> DbResult<BlockingSession<'_>> {
        let session = self.runtime.block_on(self.db()?.session())?;
        Ok(BlockingSession {
            runtime: &self.runtime,
            session: Some(session),
        })
    }
}

impl Drop for BlockingDatabase {
    fn drop(&mut self) {
        let _guard = self.runtime.enter();
        self.db.take();
    }
}

/// Blocking counterpart of [`SqliteSession`].
pub struct BlockingSession<'rt> {
    runtime: &'rt Runtime,
    session: Option<SqliteSession>,
}

impl Drop for BlockingSession<'_> {
    fn drop(&mut self) {
        // Returning the connection to the pool spawns onto the runtime
        let _guard = self.runtime.enter();
        self.session.take();
    }
}

impl<'rt> BlockingSession<'rt> {
    fn parts(&mut self) -> DbResult<(&'rt Runtime, &mut SqliteSession)> {
        let session = self.session.as_mut().ok_or_else(closed)?;
        Ok((self.runtime, session))
    }

    // Users

    pub fn create_user(&mut self, user: &NewUser) -> DbResult<User> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().create(user))
    }

    pub fn get_user(&mut self, id: i64) -> DbResult<Option<User>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().get(id))
    }

    pub fn user_language(&mut self, id: i64) -> DbResult<Option<String>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().language(id))
    }

    pub fn list_users(&mut self, query: Option<&UserQuery>) -> DbResult<Vec<User>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().list(query))
    }

    pub fn set_referrer(&mut self, user_id: i64, referrer_id: Option<i64>) -> DbResult<User> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().set_referrer(user_id, referrer_id))
    }

    pub fn delete_user(&mut self, id: i64) -> DbResult<bool> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().delete(id))
    }

    pub fn delete_all_users(&mut self) -> DbResult<u64> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.users().delete_all())
    }

    // Orders

    pub fn create_order(&mut self, user_id: i64) -> DbResult<Order> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().create(user_id))
    }

    pub fn get_order(&mut self, order_id: i64) -> DbResult<Option<Order>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().get(order_id))
    }

    pub fn orders_for_user(&mut self, user_id: i64) -> DbResult<Vec<Order>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().list_for_user(user_id))
    }

    pub fn add_line(
        &mut self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<OrderProduct> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().add_line(order_id, product_id, quantity))
    }

    pub fn add_lines(&mut self, order_id: i64, items: &[LineItem]) -> DbResult<Vec<OrderProduct>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().add_lines(order_id, items))
    }

    pub fn order_lines(&mut self, order_id: i64) -> DbResult<Vec<OrderLine>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().lines(order_id))
    }

    pub fn delete_order(&mut self, order_id: i64) -> DbResult<bool> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.orders().delete(order_id))
    }

    // Products

    pub fn create_product(&mut self, product: &NewProduct) -> DbResult<Product> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.products().create(product))
    }

    pub fn create_products(&mut self, products: &[NewProduct]) -> DbResult<Vec<Product>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.products().create_many(products))
    }

    pub fn get_product(&mut self, product_id: i64) -> DbResult<Option<Product>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.products().get(product_id))
    }

    pub fn list_products(&mut self) -> DbResult<Vec<Product>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.products().list())
    }

    pub fn delete_product(&mut self, product_id: i64) -> DbResult<bool> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.products().delete(product_id))
    }

    // Reports

    pub fn order_count(&mut self, user_id: i64) -> DbResult<i64> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().order_count(user_id))
    }

    pub fn order_counts(&mut self) -> DbResult<Vec<UserOrderCount>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().order_counts())
    }

    pub fn quantity_totals(&mut self, min: Option<i64>) -> DbResult<Vec<UserQuantityTotal>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().quantity_totals(min))
    }

    pub fn orders_with_user(&mut self, user_id: i64) -> DbResult<Vec<OrderWithUser>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().orders_with_user(user_id))
    }

    pub fn user_order_lines(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().user_order_lines(user_id))
    }

    pub fn user_order_lines_per_row(&mut self, user_id: i64) -> DbResult<Vec<OrderLineRow>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().user_order_lines_per_row(user_id))
    }

    pub fn referrals(&mut self) -> DbResult<Vec<Referral>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().referrals())
    }

    pub fn users_with_orders(&mut self) -> DbResult<Vec<UserOrders>> {
        let (rt, s) = self.parts()?;
        rt.block_on(s.reports().users_with_orders())
    }
}
