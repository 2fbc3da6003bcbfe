//! Tests for SqliteReportRepository.

use crate::db::{
    Database, NewProduct, NewUser, OrderRepository, Price, ProductRepository, ReportRepository,
    Session, SqliteDatabase, SqliteSession, UserQuantityTotal, UserRepository,
};

async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

/// Users 1..=3 (3 referred by 1), products P1..P3, and:
/// user 1: order a {P1 x2, P2 x1}, order b {P3 x4}
/// user 2: order c {P1 x3}
/// user 3: no orders
async fn seed(session: &mut SqliteSession) -> Vec<i64> {
    let mut users = session.users();
    users
        .create(&NewUser::new(1, "Alice", "en").user_name("alice"))
        .await
        .unwrap();
    users.create(&NewUser::new(2, "Bohdan", "uk")).await.unwrap();
    users
        .create(&NewUser::new(3, "Chen", "en").referrer(1))
        .await
        .unwrap();

    let products: Vec<i64> = session
        .products()
        .create_many(&[
            NewProduct::new("P1", "1.00".parse::<Price>().unwrap()),
            NewProduct::new("P2", "2.00".parse::<Price>().unwrap()),
            NewProduct::new("P3", "3.00".parse::<Price>().unwrap()),
        ])
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.product_id)
        .collect();

    let mut orders = session.orders();
    let a = orders.create(1).await.unwrap().order_id;
    let b = orders.create(1).await.unwrap().order_id;
    let c = orders.create(2).await.unwrap().order_id;

    orders.add_line(a, products[1], 1).await.unwrap();
    orders.add_line(a, products[0], 2).await.unwrap();
    orders.add_line(b, products[2], 4).await.unwrap();
    orders.add_line(c, products[0], 3).await.unwrap();

    products
}

#[tokio::test(flavor = "multi_thread")]
async fn report_order_count() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    seed(&mut session).await;

    let mut reports = session.reports();
    assert_eq!(reports.order_count(1).await.unwrap(), 2);
    assert_eq!(reports.order_count(2).await.unwrap(), 1);
    assert_eq!(reports.order_count(3).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn report_order_counts_per_user() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    seed(&mut session).await;

    let counts = session.reports().order_counts().await.unwrap();
    let pairs: Vec<(i64, i64)> = counts.iter().map(|c| (c.user_id, c.orders)).collect();
    assert_eq!(pairs, vec![(1, 2), (2, 1)]);
    assert_eq!(counts[0].full_name, "Alice");
}

#[tokio::test(flavor = "multi_thread")]
async fn report_quantity_totals_threshold_is_strict() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    seed(&mut session).await;

    let mut reports = session.reports();

    let all = reports.quantity_totals(None).await.unwrap();
    assert_eq!(
        all,
        vec![
            UserQuantityTotal {
                user_id: 1,
                full_name: "Alice".to_string(),
                quantity: 7,
            },
            UserQuantityTotal {
                user_id: 2,
                full_name: "Bohdan".to_string(),
                quantity: 3,
            },
        ]
    );

    // User 2 sums to exactly 3 and is excluded
    let above: Vec<i64> = reports
        .quantity_totals(Some(3))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.user_id)
        .collect();
    assert_eq!(above, vec![1]);

    let above: Vec<i64> = reports
        .quantity_totals(Some(2))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.user_id)
        .collect();
    assert_eq!(above, vec![1, 2]);

    // Each single line of user 1 is below 7; the threshold sees the sum
    assert_eq!(reports.quantity_totals(Some(6)).await.unwrap().len(), 1);
    assert!(reports.quantity_totals(Some(7)).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn report_orders_with_user() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    seed(&mut session).await;

    let rows = session.reports().orders_with_user(1).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.user.id == 1 && r.order.user_id == 1));
    assert!(rows[0].order.order_id < rows[1].order.order_id);
    assert_eq!(rows[0].user.user_name.as_deref(), Some("alice"));

    assert!(session.reports().orders_with_user(3).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn report_user_order_lines_strategies_agree() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    let products = seed(&mut session).await;

    let joined = session.reports().user_order_lines(1).await.unwrap();
    let per_row = session.reports().user_order_lines_per_row(1).await.unwrap();

    assert_eq!(joined, per_row);

    let shape: Vec<(i64, i64)> = joined
        .iter()
        .map(|r| (r.product.product_id, r.quantity))
        .collect();
    assert_eq!(
        shape,
        vec![(products[0], 2), (products[1], 1), (products[2], 4)]
    );
    assert!(joined.iter().all(|r| r.user_name.as_deref() == Some("alice")));

    // User without a user_name, and users without orders
    let joined = session.reports().user_order_lines(2).await.unwrap();
    assert_eq!(joined, session.reports().user_order_lines_per_row(2).await.unwrap());
    assert_eq!(joined[0].user_name, None);

    assert!(session.reports().user_order_lines(3).await.unwrap().is_empty());
    assert!(session.reports().user_order_lines_per_row(3).await.unwrap().is_empty());
    assert!(session.reports().user_order_lines_per_row(99).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn report_referrals() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    seed(&mut session).await;

    let referrals = session.reports().referrals().await.unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].referrer_id, 1);
    assert_eq!(referrals[0].referrer_name, "Alice");
    assert_eq!(referrals[0].referral_id, 3);
    assert_eq!(referrals[0].referral_name, "Chen");
}

#[tokio::test(flavor = "multi_thread")]
async fn report_users_with_orders_builds_full_tree() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();
    let products = seed(&mut session).await;

    let tree = session.reports().users_with_orders().await.unwrap();
    let ids: Vec<i64> = tree.iter().map(|u| u.user.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let alice = &tree[0];
    assert_eq!(alice.orders.len(), 2);
    let first: Vec<(i64, i64)> = alice.orders[0]
        .lines
        .iter()
        .map(|l| (l.product.product_id, l.quantity))
        .collect();
    assert_eq!(first, vec![(products[0], 2), (products[1], 1)]);
    assert_eq!(alice.orders[1].lines.len(), 1);

    assert_eq!(tree[1].orders.len(), 1);
    assert!(tree[2].orders.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn report_users_with_orders_keeps_empty_orders() {
    let db = setup_db().await;
    let mut session = db.session().await.unwrap();

    session
        .users()
        .create(&NewUser::new(10, "Solo", "en"))
        .await
        .unwrap();
    let order = session.orders().create(10).await.unwrap();

    let tree = session.reports().users_with_orders().await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].orders.len(), 1);
    assert_eq!(tree[0].orders[0].order, order);
    assert!(tree[0].orders[0].lines.is_empty());
}
