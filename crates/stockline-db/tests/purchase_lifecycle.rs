//! Purchase lifecycle against an in-memory database.

mod common;

use chrono::{Duration, Utc};

use common::*;
use stockline_core::{
    ErrorKind, InventoryEventType, Money, MovementDirection, NewPurchase, NewPurchaseItem,
    PostPurchaseItem, PurchaseDocumentType, PurchaseStatus, SourceType,
};

fn item(product_id: &str, quantity: i64, cost_cents: i64) -> NewPurchaseItem {
    NewPurchaseItem {
        product_id: product_id.to_string(),
        quantity,
        unit_cost: Money::from_cents(cost_cents),
    }
}

// =============================================================================
// Draft
// =============================================================================

#[tokio::test]
async fn test_draft_computes_totals_and_defaults() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let milk = product(&f, "Milk 1L", 130, true).await;

    let draft = f
        .engine
        .create_draft_purchase(
            &f.warehouse,
            &NewPurchase {
                supplier_id: Some(f.supplier_id.clone()),
                document_number: Some("  F-001  ".to_string()),
                items: vec![item(&rice, 10, 140), item(&milk, 4, 85)],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(draft.status(), PurchaseStatus::Draft);
    assert_eq!(draft.purchase.document_type, PurchaseDocumentType::Invoice);
    assert_eq!(draft.purchase.document_number.as_deref(), Some("F-001"));
    assert_eq!(draft.purchase.total, Money::from_cents(1740));
    assert_eq!(draft.items.len(), 2);
    assert_eq!(draft.items[0].item.line_no, 1);
    assert_eq!(draft.items[0].item.subtotal, Money::from_cents(1400));
    assert!(draft.items.iter().all(|i| i.batches.is_empty()));

    assert_eq!(stock(&f, &rice).await, 0);
    assert!(f
        .engine
        .movements_for_source(SourceType::Purchase, draft.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_draft_validation() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;

    let duplicate = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, 1, 100), item(&rice, 2, 100)],
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &duplicate).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let negative = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, 1, -5)],
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &negative).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let empty = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let unknown_supplier = NewPurchase {
        supplier_id: Some("no-such-supplier".to_string()),
        items: vec![item(&rice, 1, 100)],
        ..Default::default()
    };
    let err = f
        .engine
        .create_draft_purchase(&f.warehouse, &unknown_supplier)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let missing_products = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, 1, 100), item("ghost", 1, 100)],
        ..Default::default()
    };
    let err = f
        .engine
        .create_draft_purchase(&f.warehouse, &missing_products)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn test_draft_rejects_oversized_amounts() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let beans = product(&f, "Beans", 120, false).await;

    let huge_quantity = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, i64::MAX / 2, 1_000_000)],
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &huge_quantity).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let huge_subtotal = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, 1000, i64::MAX / 10)],
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &huge_subtotal).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("subtotal is too large"), "{}", err);

    let huge_total = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![item(&rice, 6, i64::MAX / 10), item(&beans, 6, i64::MAX / 10)],
        ..Default::default()
    };
    let err = f.engine.create_draft_purchase(&f.warehouse, &huge_total).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("total is too large"), "{}", err);
}

#[tokio::test]
async fn test_free_cost_items_are_allowed() {
    let f = setup().await;
    let sample = product(&f, "Sample Sachet", 0, false).await;

    let draft = f
        .engine
        .create_draft_purchase(
            &f.warehouse,
            &NewPurchase {
                supplier_id: None,
                items: vec![item(&sample, 3, 0)],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(draft.purchase.total, Money::zero());
}

// =============================================================================
// Post
// =============================================================================

#[tokio::test]
async fn test_post_perishable_creates_dated_batch() {
    let f = setup().await;
    let milk = product(&f, "Milk 1L", 130, true).await;

    let posted = receive(&f, &milk, vec![spec(20, Some(days(14)))]).await;

    assert_eq!(posted.status(), PurchaseStatus::Posted);
    assert_eq!(posted.purchase.posted_by.as_deref(), Some(f.warehouse.user_id.as_str()));
    assert_eq!(stock(&f, &milk).await, 20);

    let batches = &posted.items[0].batches;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].qty_initial, 20);
    assert_eq!(batches[0].qty_available, 20);
    assert_eq!(batches[0].unit_cost, Money::from_cents(100));
    assert_eq!(batches[0].purchase_item_id.as_deref(), Some(posted.items[0].item.id.as_str()));
    assert!(batches[0].expires_at.is_some());

    let movements = f
        .engine
        .movements_for_source(SourceType::Purchase, posted.id())
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement.event_type, InventoryEventType::PurchaseIn);
    assert_eq!(movements[0].movement.direction, MovementDirection::In);
    assert_eq!(movements[0].items[0].previous_stock, 0);
    assert_eq!(movements[0].items[0].new_stock, 20);
    assert_stock_consistent(&f, &milk).await;
}

#[tokio::test]
async fn test_post_non_perishable_gets_implicit_batch() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;

    let posted = receive_qty(&f, &rice, 12, Vec::new()).await;

    let batches = &posted.items[0].batches;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].qty_initial, 12);
    assert!(batches[0].expires_at.is_none());
    assert!(batches[0].batch_code.is_none());
    assert_eq!(stock(&f, &rice).await, 12);
}

#[tokio::test]
async fn test_post_rejects_bad_batches() {
    let f = setup().await;
    let milk = product(&f, "Milk 1L", 130, true).await;
    let draft = draft_purchase(&f, &milk, 10).await;
    let item_id = draft.items[0].item.id.clone();

    let attempts = vec![
        // perishable without batches
        Vec::new(),
        // perishable batch without expiry
        vec![spec(10, None)],
        // expiry in the past
        vec![spec(10, Some(Utc::now() - Duration::days(1)))],
        // quantities do not add up
        vec![spec(4, Some(days(5))), spec(5, Some(days(6)))],
        // zero quantity
        vec![spec(0, Some(days(5))), spec(10, Some(days(6)))],
    ];

    for batches in attempts {
        let items = vec![PostPurchaseItem {
            purchase_item_id: item_id.clone(),
            batches: batches.clone(),
        }];
        let err = f
            .engine
            .post_purchase(&f.warehouse, draft.id(), &items)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "batches {:?}", batches);
    }

    assert_eq!(stock(&f, &milk).await, 0);
    assert_eq!(
        f.engine.get_purchase(draft.id()).await.unwrap().status(),
        PurchaseStatus::Draft
    );
}

#[tokio::test]
async fn test_post_requires_exact_item_set() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let draft = draft_purchase(&f, &rice, 5).await;

    let wrong = vec![PostPurchaseItem {
        purchase_item_id: "not-an-item".to_string(),
        batches: Vec::new(),
    }];
    let err = f.engine.post_purchase(&f.warehouse, draft.id(), &wrong).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let doubled = vec![
        PostPurchaseItem {
            purchase_item_id: draft.items[0].item.id.clone(),
            batches: Vec::new(),
        },
        PostPurchaseItem {
            purchase_item_id: draft.items[0].item.id.clone(),
            batches: Vec::new(),
        },
    ];
    let err = f.engine.post_purchase(&f.warehouse, draft.id(), &doubled).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_post_is_idempotent() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let draft = draft_purchase(&f, &rice, 5).await;
    let items = vec![PostPurchaseItem {
        purchase_item_id: draft.items[0].item.id.clone(),
        batches: Vec::new(),
    }];

    let first = f.engine.post_purchase(&f.warehouse, draft.id(), &items).await.unwrap();
    let second = f.engine.post_purchase(&f.warehouse, draft.id(), &items).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stock(&f, &rice).await, 5);
    assert_eq!(
        f.engine
            .movements_for_source(SourceType::Purchase, draft.id())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_post_voided_purchase_is_conflict() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let draft = draft_purchase(&f, &rice, 5).await;
    f.engine.void_purchase(&f.warehouse, draft.id(), None).await.unwrap();

    let items = vec![PostPurchaseItem {
        purchase_item_id: draft.items[0].item.id.clone(),
        batches: Vec::new(),
    }];
    let err = f.engine.post_purchase(&f.warehouse, draft.id(), &items).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_post_missing_purchase_is_not_found() {
    let f = setup().await;
    let err = f.engine.post_purchase(&f.warehouse, "missing", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Void
// =============================================================================

#[tokio::test]
async fn test_void_posted_purchase_returns_stock() {
    let f = setup().await;
    let milk = product(&f, "Milk 1L", 130, true).await;
    receive(&f, &milk, vec![spec(3, Some(days(20)))]).await;
    let posted = receive(&f, &milk, vec![spec(6, Some(days(5))), spec(4, Some(days(9)))]).await;
    assert_eq!(stock(&f, &milk).await, 13);

    let voided = f.engine.void_purchase(&f.warehouse, posted.id(), None).await.unwrap();

    assert_eq!(voided.status(), PurchaseStatus::Voided);
    assert_eq!(voided.purchase.void_reason.as_deref(), Some("Purchase voided"));
    assert_eq!(stock(&f, &milk).await, 3);
    assert!(voided.items[0].batches.iter().all(|b| b.qty_available == 0));
    let batches = f.db().batches().for_purchase(posted.id()).await.unwrap();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.qty_available == 0 && b.qty_initial > 0));
    assert_stock_consistent(&f, &milk).await;

    let movements = f
        .engine
        .movements_for_source(SourceType::Purchase, posted.id())
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    let back = &movements[1];
    assert_eq!(back.movement.event_type, InventoryEventType::PurchaseReturnOut);
    assert_eq!(back.movement.direction, MovementDirection::Out);
    assert_eq!(back.movement.reason.as_deref(), Some("Purchase voided"));
    assert_eq!(back.items[0].quantity, 10);
    assert_eq!(back.items[0].previous_stock, 13);
    assert_eq!(back.items[0].new_stock, 3);

    let again = f.engine.void_purchase(&f.warehouse, posted.id(), Some("late")).await.unwrap();
    assert_eq!(again, voided);
}

#[tokio::test]
async fn test_void_after_consumption_is_conflict() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let posted = receive_qty(&f, &rice, 5, Vec::new()).await;
    active_sale(&f, &f.seller, &[(&rice, 1)]).await;

    let err = f.engine.void_purchase(&f.admin, posted.id(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("already consumed"), "{}", err);

    assert_eq!(stock(&f, &rice).await, 4);
    assert_eq!(
        f.engine.get_purchase(posted.id()).await.unwrap().status(),
        PurchaseStatus::Posted
    );
}

#[tokio::test]
async fn test_void_after_sale_is_voided_succeeds() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let posted = receive_qty(&f, &rice, 5, Vec::new()).await;
    let sale = active_sale(&f, &f.seller, &[(&rice, 2)]).await;
    f.engine.void_sale(&f.admin, sale.id(), None).await.unwrap();

    f.engine
        .void_purchase(&f.admin, posted.id(), Some("damaged on arrival"))
        .await
        .unwrap();
    assert_eq!(stock(&f, &rice).await, 0);
    assert_stock_consistent(&f, &rice).await;
}

#[tokio::test]
async fn test_void_draft_has_no_inventory_effect() {
    let f = setup().await;
    let rice = product(&f, "Rice 1kg", 250, false).await;
    let draft = draft_purchase(&f, &rice, 5).await;

    let voided = f
        .engine
        .void_purchase(&f.warehouse, draft.id(), Some("  wrong supplier "))
        .await
        .unwrap();
    assert_eq!(voided.status(), PurchaseStatus::Voided);
    assert_eq!(voided.purchase.void_reason.as_deref(), Some("wrong supplier"));
    assert!(f
        .engine
        .movements_for_source(SourceType::Purchase, draft.id())
        .await
        .unwrap()
        .is_empty());
}
