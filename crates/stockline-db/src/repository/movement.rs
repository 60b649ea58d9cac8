//! # Movement Repository
//!
//! Append-only inventory ledger. Rows are inserted, never updated or
//! deleted; triggers in the schema reject both.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use stockline_core::ledger::MovementDraft;
use stockline_core::{InventoryMovement, InventoryMovementItem, MovementView, SourceType};

use super::new_id;
use crate::error::DbResult;

/// Appends one movement header and one item per stock change.
pub async fn tx_record(
    conn: &mut SqliteConnection,
    draft: &MovementDraft,
    at: DateTime<Utc>,
) -> DbResult<MovementView> {
    let movement = InventoryMovement {
        id: new_id(),
        direction: draft.direction,
        source_type: draft.source_type,
        source_id: draft.source_id.clone(),
        event_type: draft.event_type,
        actor_id: draft.actor_id.clone(),
        reason: draft.reason.clone(),
        created_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, direction, source_type, source_id, event_type, actor_id, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&movement.id)
    .bind(movement.direction)
    .bind(movement.source_type)
    .bind(&movement.source_id)
    .bind(movement.event_type)
    .bind(&movement.actor_id)
    .bind(&movement.reason)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(draft.items.len());
    for change in &draft.items {
        let item = InventoryMovementItem {
            id: new_id(),
            movement_id: movement.id.clone(),
            product_id: change.product_id.clone(),
            quantity: change.quantity,
            previous_stock: change.previous_stock,
            new_stock: change.new_stock,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_movement_items (
                id, movement_id, product_id, quantity, previous_stock, new_stock
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.movement_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.previous_stock)
        .bind(item.new_stock)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    debug!(
        movement_id = %movement.id,
        event = ?movement.event_type,
        source_id = %movement.source_id,
        items = items.len(),
        "Inventory movement recorded"
    );

    Ok(MovementView { movement, items })
}

/// Movements of one source, oldest first, items in product order.
pub async fn fetch_for_source(
    conn: &mut SqliteConnection,
    source_type: SourceType,
    source_id: &str,
) -> DbResult<Vec<MovementView>> {
    let movements = sqlx::query_as::<_, InventoryMovement>(
        r#"
        SELECT id, direction, source_type, source_id, event_type, actor_id, reason, created_at
        FROM inventory_movements
        WHERE source_type = ?1 AND source_id = ?2
        ORDER BY created_at, rowid
        "#,
    )
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut views = Vec::with_capacity(movements.len());
    for movement in movements {
        let items = sqlx::query_as::<_, InventoryMovementItem>(
            r#"
            SELECT id, movement_id, product_id, quantity, previous_stock, new_stock
            FROM inventory_movement_items
            WHERE movement_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(&movement.id)
        .fetch_all(&mut *conn)
        .await?;
        views.push(MovementView { movement, items });
    }
    Ok(views)
}

#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    pub async fn for_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> DbResult<Vec<MovementView>> {
        let mut tx = self.pool.begin().await?;
        let views = fetch_for_source(&mut tx, source_type, source_id).await?;
        tx.commit().await?;
        Ok(views)
    }

    /// Total number of movement headers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
