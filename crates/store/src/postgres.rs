use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId, UserId, VariantId};
use domain::{
    Availability, Money, Order, OrderItem, OrderStatus, PaymentStatus, Reservation, Shortage,
    Variant,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{
        CommitOutcome, InventoryStore, OrderStore, ReserveRequest, ensure_none_released,
        settle_without_holds,
    },
};

const ONE_ACTIVE_HOLD_CONSTRAINT: &str = "reservations_one_active_per_order_variant";

const RESERVATION_COLUMNS: &str =
    "id, order_id, user_id, variant_id, quantity, status, expires_at, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, amount_minor, shipping_fee_minor, currency, status, \
     payment_status, payment_method, shipping_address, gateway_order_id, created_at, updated_at";

/// PostgreSQL-backed store.
///
/// Writers lock `variants` rows (in id order) before touching `reservations`,
/// so reserve, commit and the reaper cannot deadlock against each other.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// A variant row locked inside a transaction.
struct LockedVariant {
    stock: u32,
    sellable: bool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_variant(row: PgRow) -> Result<Variant> {
        Ok(Variant {
            id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            size: row.try_get("size")?,
            color: row.try_get("color")?,
            price: Money::from_minor(row.try_get("price_minor")?),
            stock_quantity: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
            enabled: row.try_get("enabled")?,
            product_active: row.try_get("product_active")?,
        })
    }

    fn row_to_reservation(row: PgRow) -> Result<Reservation> {
        let status: String = row.try_get("status")?;
        Ok(Reservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            status: status.parse()?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let currency: String = row.try_get("currency")?;
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let payment_method: String = row.try_get("payment_method")?;
        let address: serde_json::Value = row.try_get("shipping_address")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            amount: Money::from_minor(row.try_get("amount_minor")?),
            shipping_fee: Money::from_minor(row.try_get("shipping_fee_minor")?),
            currency: currency.parse()?,
            status: status.parse()?,
            payment_status: payment_status.parse()?,
            payment_method: payment_method.parse()?,
            shipping_address: serde_json::from_value(address)?,
            gateway_order_id: row.try_get("gateway_order_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            product_name: row.try_get("product_name")?,
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            price_at_purchase: Money::from_minor(row.try_get("price_at_purchase_minor")?),
        })
    }

    /// Locks the given variant rows in id order.
    async fn lock_variants(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, LockedVariant>> {
        let rows = sqlx::query(
            r#"
            SELECT id, stock_quantity, enabled, product_active
            FROM variants
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(Uuid, LockedVariant)> {
                let id: Uuid = row.try_get("id")?;
                let enabled: bool = row.try_get("enabled")?;
                let product_active: bool = row.try_get("product_active")?;
                Ok((
                    id,
                    LockedVariant {
                        stock: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
                        sellable: enabled && product_active,
                    },
                ))
            })
            .collect()
    }

    /// Counts the order's committed holds and lists the variants of its
    /// released ones.
    async fn settled_holds(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<(usize, Vec<VariantId>)> {
        let rows = sqlx::query(
            "SELECT variant_id, status FROM reservations \
             WHERE order_id = $1 AND status <> 'reserved' ORDER BY variant_id",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;
        let mut already_committed = 0;
        let mut released = Vec::new();
        for row in rows {
            let status: String = row.try_get("status")?;
            match status.as_str() {
                "committed" => already_committed += 1,
                "released" => {
                    released.push(VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?))
                }
                _ => {}
            }
        }
        Ok((already_committed, released))
    }

    /// Sums active holds per variant, optionally ignoring one order's holds.
    async fn held_by_variant(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
        now: DateTime<Utc>,
        excluding_order: Option<Uuid>,
    ) -> Result<HashMap<Uuid, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT variant_id, SUM(quantity)::BIGINT AS held
            FROM reservations
            WHERE variant_id = ANY($1)
              AND status = 'reserved'
              AND expires_at > $2
              AND ($3::UUID IS NULL OR order_id <> $3)
            GROUP BY variant_id
            "#,
        )
        .bind(ids)
        .bind(now)
        .bind(excluding_order)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(Uuid, u64)> {
                let held: i64 = row.try_get("held")?;
                Ok((row.try_get("variant_id")?, u64::try_from(held).unwrap_or(0)))
            })
            .collect()
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn sorted_unique(ids: impl IntoIterator<Item = VariantId>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = ids.into_iter().map(|id| id.as_uuid()).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn record_duration(op: &'static str, started: Instant) {
    metrics::histogram!("store_transaction_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn upsert_variant(&self, variant: &Variant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO variants (id, product_id, product_name, size, color, price_minor,
                                  stock_quantity, enabled, product_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                product_name = EXCLUDED.product_name,
                size = EXCLUDED.size,
                color = EXCLUDED.color,
                price_minor = EXCLUDED.price_minor,
                stock_quantity = EXCLUDED.stock_quantity,
                enabled = EXCLUDED.enabled,
                product_active = EXCLUDED.product_active
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(&variant.product_name)
        .bind(&variant.size)
        .bind(&variant.color)
        .bind(variant.price.minor())
        .bind(to_i32(variant.stock_quantity, "stock_quantity")?)
        .bind(variant.enabled)
        .bind(variant.product_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn restock(&self, variant_id: VariantId, quantity: u32) -> Result<Variant> {
        let row = sqlx::query(
            r#"
            UPDATE variants SET stock_quantity = stock_quantity + $2
            WHERE id = $1
            RETURNING id, product_id, product_name, size, color, price_minor,
                      stock_quantity, enabled, product_active
            "#,
        )
        .bind(variant_id.as_uuid())
        .bind(to_i32(quantity, "quantity")?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::VariantNotFound(variant_id))?;

        Self::row_to_variant(row)
    }

    async fn get_variants(&self, ids: &[VariantId]) -> Result<Vec<Variant>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, product_name, size, color, price_minor,
                   stock_quantity, enabled, product_active
            FROM variants
            WHERE id = ANY($1)
            "#,
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<VariantId, Variant> = rows
            .into_iter()
            .map(|row| Self::row_to_variant(row).map(|v| (v.id, v)))
            .collect::<Result<_>>()?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn availability(
        &self,
        ids: &[VariantId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Availability>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT v.id, v.stock_quantity, v.enabled, v.product_active,
                   COALESCE(SUM(r.quantity) FILTER (
                       WHERE r.status = 'reserved' AND r.expires_at > $2
                   ), 0)::BIGINT AS held
            FROM variants v
            LEFT JOIN reservations r ON r.variant_id = v.id
            WHERE v.id = ANY($1)
            GROUP BY v.id
            "#,
        )
        .bind(&uuids)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = VariantId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let enabled: bool = row.try_get("enabled")?;
            let product_active: bool = row.try_get("product_active")?;
            let held: i64 = row.try_get("held")?;
            by_id.insert(
                id,
                Availability::from_stock(
                    id,
                    to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
                    enabled && product_active,
                    u64::try_from(held).unwrap_or(0),
                ),
            );
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, lines = request.lines.len()))]
    async fn reserve(&self, request: ReserveRequest) -> Result<Vec<Reservation>> {
        let started = Instant::now();
        let ids = sorted_unique(request.lines.iter().map(|l| l.variant_id));

        let mut tx = self.pool.begin().await?;
        let locked = Self::lock_variants(&mut tx, &ids).await?;
        let held = Self::held_by_variant(&mut tx, &ids, request.now, None).await?;

        let shortages: Vec<Shortage> = request
            .lines
            .iter()
            .filter_map(|line| {
                let id = line.variant_id.as_uuid();
                let available = match locked.get(&id) {
                    Some(v) => Availability::from_stock(
                        line.variant_id,
                        v.stock,
                        v.sellable,
                        held.get(&id).copied().unwrap_or(0),
                    ),
                    None => Availability::unknown(line.variant_id),
                };
                (!available.covers(line.quantity)).then_some(Shortage {
                    variant_id: line.variant_id,
                    requested: line.quantity,
                    available: available.available_to_sell,
                })
            })
            .collect();
        if !shortages.is_empty() {
            // Dropping the transaction rolls it back and frees the row locks.
            return Err(StoreError::OutOfStock(shortages));
        }

        let mut holds = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let hold = Reservation::hold(
                request.order_id,
                request.user_id,
                line.variant_id,
                line.quantity,
                request.now,
                request.expires_at,
            );
            sqlx::query(
                r#"
                INSERT INTO reservations (id, order_id, user_id, variant_id, quantity, status,
                                          expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(hold.id.as_uuid())
            .bind(hold.order_id.as_uuid())
            .bind(hold.user_id.as_uuid())
            .bind(hold.variant_id.as_uuid())
            .bind(to_i32(hold.quantity, "quantity")?)
            .bind(hold.status.as_str())
            .bind(hold.expires_at)
            .bind(hold.created_at)
            .bind(hold.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(ONE_ACTIVE_HOLD_CONSTRAINT)
                {
                    return StoreError::DuplicateReservation {
                        order_id: request.order_id,
                        variant_id: line.variant_id,
                    };
                }
                StoreError::Database(e)
            })?;
            holds.push(hold);
        }

        tx.commit().await?;
        record_duration("reserve", started);
        Ok(holds)
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<CommitOutcome> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let variant_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT variant_id FROM reservations WHERE order_id = $1 AND status = 'reserved' ORDER BY variant_id",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        if variant_ids.is_empty() {
            let (already_committed, released) = Self::settled_holds(&mut tx, order_id).await?;
            return settle_without_holds(order_id, already_committed, released);
        }

        let locked = Self::lock_variants(&mut tx, &variant_ids).await?;
        let holds: Vec<Reservation> = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE order_id = $1 AND status = 'reserved' ORDER BY variant_id FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Self::row_to_reservation)
        .collect::<Result<_>>()?;

        // The reaper or a concurrent commit may have settled rows between the
        // unlocked read above and the variant locks.
        let (already_committed, released) = Self::settled_holds(&mut tx, order_id).await?;
        if holds.is_empty() {
            return settle_without_holds(order_id, already_committed, released);
        }
        ensure_none_released(order_id, released)?;

        let others = Self::held_by_variant(&mut tx, &variant_ids, now, Some(order_id.as_uuid()))
            .await?;
        let lapsed: Vec<VariantId> = holds
            .iter()
            .filter(|hold| hold.is_lapsed(now))
            .filter(|hold| {
                let id = hold.variant_id.as_uuid();
                let stock = locked.get(&id).map(|v| u64::from(v.stock)).unwrap_or(0);
                let free = stock.saturating_sub(others.get(&id).copied().unwrap_or(0));
                free < u64::from(hold.quantity)
            })
            .map(|hold| hold.variant_id)
            .collect();
        if !lapsed.is_empty() {
            return Err(StoreError::HoldLapsed {
                order_id,
                variants: lapsed,
            });
        }

        for hold in &holds {
            let updated = sqlx::query(
                "UPDATE variants SET stock_quantity = stock_quantity - $2 WHERE id = $1 AND stock_quantity >= $2",
            )
            .bind(hold.variant_id.as_uuid())
            .bind(to_i32(hold.quantity, "quantity")?)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                let available = locked
                    .get(&hold.variant_id.as_uuid())
                    .map(|v| v.stock)
                    .unwrap_or(0);
                return Err(StoreError::OutOfStock(vec![Shortage {
                    variant_id: hold.variant_id,
                    requested: hold.quantity,
                    available,
                }]));
            }
        }

        let ids: Vec<Uuid> = holds.iter().map(|h| h.id.as_uuid()).collect();
        let committed = sqlx::query(
            "UPDATE reservations SET status = 'committed', updated_at = $2 WHERE id = ANY($1) AND status = 'reserved'",
        )
        .bind(&ids)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        record_duration("commit", started);
        Ok(CommitOutcome {
            committed: committed as usize,
            already_committed,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn release(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'released', updated_at = $2 WHERE order_id = $1 AND status = 'reserved'",
        )
        .bind(order_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn release_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<usize> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            WITH expired AS (
                SELECT id FROM reservations
                WHERE status = 'reserved' AND expires_at < $1
                ORDER BY expires_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE reservations r
            SET status = 'released', updated_at = $1
            FROM expired
            WHERE r.id = expired.id
            "#,
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        record_duration("release_expired", started);
        Ok(result.rows_affected() as usize)
    }

    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_reservation).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let address = serde_json::to_value(&order.shipping_address)?;
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.amount.minor())
        .bind(order.shipping_fee.minor())
        .bind(order.currency.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(address)
        .bind(&order.gateway_order_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::OrderExists(order.id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = $1"
        ))
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let address = serde_json::to_value(&order.shipping_address)?;
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                amount_minor = $2,
                shipping_fee_minor = $3,
                status = $4,
                payment_status = $5,
                payment_method = $6,
                shipping_address = $7,
                gateway_order_id = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.amount.minor())
        .bind(order.shipping_fee.minor())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(address)
        .bind(&order.gateway_order_id)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order.id));
        }
        Ok(())
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<bool> {
        from.ensure_transition(to)?;
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $3, payment_status = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(payment_status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Ok(false)
        } else {
            Err(StoreError::OrderNotFound(order_id))
        }
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_items(&self, items: &[OrderItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, variant_id, product_name, quantity, price_at_purchase_minor)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_id.as_uuid())
            .bind(item.variant_id.as_uuid())
            .bind(&item.product_name)
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(item.price_at_purchase.minor())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::OrderNotFound(item.order_id);
                }
                StoreError::Database(e)
            })?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, variant_id, product_name, quantity, price_at_purchase_minor
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_name, variant_id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }
}
