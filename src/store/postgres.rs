use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AccountStore, BookingStore, PropertyStore, StoreError};
use crate::booking::{Booking, BookingFilter, BookingStatus, PageRequest};
use crate::models::{PaginatedResponse, PaymentProfile, Property, User};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    if let Some(user_id) = filter.user_id {
        builder.push(" AND b.user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(property_id) = filter.property_id {
        builder.push(" AND b.property_id = ");
        builder.push_bind(property_id);
    }
    if let Some(owner_id) = filter.owner_id {
        builder.push(" AND p.owner_id = ");
        builder.push_bind(owner_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND b.status = ");
        builder.push_bind(status);
    }
    if let Some(date_from) = filter.date_from {
        builder.push(" AND b.date_from >= ");
        builder.push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        builder.push(" AND b.date_to <= ");
        builder.push_bind(date_to);
    }
    if let Some(city) = &filter.city {
        builder.push(" AND p.city ILIKE ");
        builder.push_bind(format!("%{}%", city));
    }
    if let Some(property_type) = filter.property_type {
        builder.push(" AND p.property_type = ");
        builder.push_bind(property_type);
    }
    if let Some(price_gte) = filter.price_gte {
        builder.push(" AND p.price >= ");
        builder.push_bind(price_gte);
    }
    if let Some(price_lte) = filter.price_lte {
        builder.push(" AND p.price <= ");
        builder.push_bind(price_lte);
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_if_available(&self, booking: Booking) -> Result<Booking, StoreError> {
        let property_id = booking.property_id.ok_or(StoreError::PropertyNotFound)?;
        let mut tx = self.db_pool.begin().await?;

        // Serializes concurrent bookings of the same property
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM properties WHERE id = $1 FOR UPDATE")
            .bind(property_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::PropertyNotFound);
        }

        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE property_id = $1
                  AND status <> 'canceled'
                  AND date_from < $3
                  AND date_to > $2
            )
            "#,
        )
        .bind(property_id)
        .bind(booking.date_from)
        .bind(booking.date_to)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(StoreError::Unavailable);
        }

        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, user_id, property_id, date_from, date_to, status,
                payment_reference, payment_expiration_time, reference_code,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.property_id)
        .bind(booking.date_from)
        .bind(booking.date_to)
        .bind(booking.status)
        .bind(&booking.payment_reference)
        .bind(booking.payment_expiration_time)
        .bind(&booking.reference_code)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(booking)
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET payment_reference = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(reference)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4 AND property_id IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(booking)
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let removed = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM bookings
            WHERE status = 'pending' AND payment_expiration_time < $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(removed)
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<Booking>, StoreError> {
        let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM bookings b LEFT JOIN properties p ON p.id = b.property_id WHERE 1=1",
        );
        push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT b.* FROM bookings b LEFT JOIN properties p ON p.id = b.property_id WHERE 1=1",
        );
        push_filters(&mut query_builder, filter);

        // Column names come from a closed enum, never from the request
        query_builder.push(" ORDER BY ");
        for key in page.sort_keys() {
            query_builder.push(format!(
                "b.{} {}, ",
                key.field.column(),
                if key.descending { "DESC" } else { "ASC" }
            ));
        }
        query_builder.push("b.id ASC LIMIT ");
        query_builder.push_bind(i64::from(page.page_size));
        query_builder.push(" OFFSET ");
        query_builder.push_bind(page.offset() as i64);

        let data = query_builder
            .build_query_as::<Booking>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse {
            data,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

#[async_trait]
impl PropertyStore for PgStore {
    async fn get_property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(property)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(user)
    }

    async fn get_payment_profile(&self, user_id: Uuid) -> Result<Option<PaymentProfile>, StoreError> {
        let profile =
            sqlx::query_as::<_, PaymentProfile>("SELECT * FROM payment_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(profile)
    }

    async fn save_payment_profile(&self, profile: PaymentProfile) -> Result<PaymentProfile, StoreError> {
        // A concurrent registration wins; return whichever row is stored
        sqlx::query(
            r#"
            INSERT INTO payment_profiles (user_id, customer_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.customer_id)
        .bind(profile.created_at)
        .execute(&self.db_pool)
        .await?;

        let stored =
            sqlx::query_as::<_, PaymentProfile>("SELECT * FROM payment_profiles WHERE user_id = $1")
                .bind(profile.user_id)
                .fetch_one(&self.db_pool)
                .await?;

        Ok(stored)
    }
}
