//! Concurrent posts against a file database with a real connection pool.

mod common;

use common::*;
use stockline_core::{ErrorKind, PostSaleOptions, SaleStatus, SourceType};
use stockline_db::{Database, DbConfig};

async fn file_fixture(dir: &tempfile::TempDir) -> Fixture {
    let db = Database::new(DbConfig::new(dir.path().join("stockline.db")).max_connections(4))
        .await
        .unwrap();
    with_database(db).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_competing_sales_cannot_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let f = file_fixture(&dir).await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    receive_qty(&f, &rice, 10, Vec::new()).await;

    let a = draft_sale(&f, &f.seller, &[(&rice, 7)]).await;
    let b = draft_sale(&f, &f.seller, &[(&rice, 7)]).await;

    let options = PostSaleOptions::default();
    let (ra, rb) = tokio::join!(
        f.engine.post_sale(&f.seller, a.id(), &options),
        f.engine.post_sale(&f.seller, b.id(), &options),
    );

    let outcomes = [ra, rb];
    let ok = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1, "exactly one post must win");
    let loser = outcomes
        .iter()
        .find_map(|r| r.as_ref().err())
        .unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict, "{}", loser);

    assert_eq!(stock(&f, &rice).await, 3);
    assert_stock_consistent(&f, &rice).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_double_post_records_one_movement() {
    let dir = tempfile::tempdir().unwrap();
    let f = file_fixture(&dir).await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    receive_qty(&f, &rice, 10, Vec::new()).await;

    let sale = draft_sale(&f, &f.seller, &[(&rice, 4)]).await;

    let options = PostSaleOptions::default();
    let (r1, r2) = tokio::join!(
        f.engine.post_sale(&f.seller, sale.id(), &options),
        f.engine.post_sale(&f.seller, sale.id(), &options),
    );
    let first = r1.unwrap();
    let second = r2.unwrap();
    assert_eq!(first.sale.status, second.sale.status);

    assert_eq!(stock(&f, &rice).await, 6);
    let movements = f
        .engine
        .movements_for_source(SourceType::Sale, sale.id())
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    // One receipt and one sale.
    assert_eq!(f.db().movements().count().await.unwrap(), 2);
    assert_eq!(f.engine.sale_history(sale.id()).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reads_never_see_half_posted_sales() {
    let dir = tempfile::tempdir().unwrap();
    let f = file_fixture(&dir).await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    receive_qty(&f, &rice, 60, Vec::new()).await;

    let mut ids = Vec::new();
    for _ in 0..60 {
        ids.push(draft_sale(&f, &f.seller, &[(&rice, 1)]).await.sale.id);
    }

    let engine = f.engine.clone();
    let seller = f.seller.clone();
    let to_post = ids.clone();
    let poster = tokio::spawn(async move {
        let options = PostSaleOptions::default();
        for id in &to_post {
            engine.post_sale(&seller, id, &options).await.unwrap();
        }
    });

    let mut reads = 0;
    loop {
        let done = poster.is_finished();
        for id in &ids {
            let view = f.engine.get_sale(id).await.unwrap();
            let allocated = view.allocations().count();
            match view.status() {
                SaleStatus::Draft => assert_eq!(allocated, 0, "draft {} has allocations", id),
                SaleStatus::Active => {
                    assert_eq!(allocated, 1, "active {} lacks allocations", id);
                    assert!(view.sale.posted_at.is_some());
                }
                other => panic!("unexpected status {:?}", other),
            }
            reads += 1;
        }
        if done {
            break;
        }
    }
    poster.await.unwrap();
    assert!(reads > 0);

    for id in &ids {
        assert_eq!(f.engine.get_sale(id).await.unwrap().status(), SaleStatus::Active);
    }
    assert_eq!(stock(&f, &rice).await, 0);
    assert_eq!(f.db().movements().count().await.unwrap(), 61);
    assert_stock_consistent(&f, &rice).await;
}
