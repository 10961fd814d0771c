use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, BookingStore, PropertyStore, StoreError};
use crate::booking::{Booking, BookingFilter, BookingStatus, PageRequest, SortField, SortKey};
use crate::models::{PaginatedResponse, PaymentProfile, Property, User};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    properties: HashMap<Uuid, Property>,
    users: HashMap<Uuid, User>,
    payment_profiles: HashMap<Uuid, PaymentProfile>,
}

/// A thread-safe in-memory store.
///
/// All tables sit behind one `RwLock`, so the availability check and the insert
/// of a booking happen under the same write guard.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn add_property(&self, property: Property) {
        self.tables
            .write()
            .await
            .properties
            .insert(property.id, property);
    }

    /// Drop a property; its bookings keep a null reference
    pub async fn remove_property(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        tables.properties.remove(&id);
        for booking in tables.bookings.values_mut() {
            if booking.property_id == Some(id) {
                booking.property_id = None;
            }
        }
    }

    /// Overwrite a booking row as-is, bypassing every check
    pub async fn put_booking(&self, booking: Booking) {
        self.tables.write().await.bookings.insert(booking.id, booking);
    }
}

fn matches_filter(booking: &Booking, property: Option<&Property>, filter: &BookingFilter) -> bool {
    if filter.user_id.is_some_and(|id| booking.user_id != id) {
        return false;
    }
    if filter.property_id.is_some() && booking.property_id != filter.property_id {
        return false;
    }
    if filter.status.is_some_and(|status| booking.status != status) {
        return false;
    }
    if filter.date_from.is_some_and(|day| booking.date_from < day) {
        return false;
    }
    if filter.date_to.is_some_and(|day| booking.date_to > day) {
        return false;
    }

    let needs_property = filter.owner_id.is_some()
        || filter.city.is_some()
        || filter.property_type.is_some()
        || filter.price_gte.is_some()
        || filter.price_lte.is_some();
    if !needs_property {
        return true;
    }
    let Some(property) = property else {
        return false;
    };

    filter.owner_id.map_or(true, |id| property.owner_id == id)
        && filter.city.as_ref().map_or(true, |city| {
            property.city.to_lowercase().contains(&city.to_lowercase())
        })
        && filter
            .property_type
            .map_or(true, |kind| property.property_type == kind)
        && filter.price_gte.map_or(true, |min| property.price >= min)
        && filter.price_lte.map_or(true, |max| property.price <= max)
}

fn compare(a: &Booking, b: &Booking, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match key.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::DateFrom => a.date_from.cmp(&b.date_from),
            SortField::DateTo => a.date_to.cmp(&b.date_to),
            SortField::Status => a.status.cmp(&b.status),
        };
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_if_available(&self, booking: Booking) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;

        let property_id = booking.property_id.ok_or(StoreError::PropertyNotFound)?;
        if !tables.properties.contains_key(&property_id) {
            return Err(StoreError::PropertyNotFound);
        }

        let requested = booking.dates();
        let taken = tables.bookings.values().any(|existing| {
            existing.property_id == Some(property_id)
                && existing.holds_dates()
                && existing.dates().overlaps(&requested)
        });
        if taken {
            return Err(StoreError::Unavailable);
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(booking) = tables.bookings.get_mut(&id) {
            booking.payment_reference = reference.to_string();
            booking.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.tables.write().await;

        // Leaving CANCELED takes the dates back, as the exclusion constraint enforces
        if from == BookingStatus::Canceled && to != BookingStatus::Canceled {
            if let Some(booking) = tables.bookings.get(&id) {
                let dates = booking.dates();
                let taken = tables.bookings.values().any(|other| {
                    other.id != id
                        && other.property_id == booking.property_id
                        && other.holds_dates()
                        && other.dates().overlaps(&dates)
                });
                if taken {
                    return Err(StoreError::Unavailable);
                }
            }
        }

        match tables.bookings.get_mut(&id) {
            Some(booking) if booking.status == from && booking.property_id.is_some() => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.bookings.remove(&id).is_some())
    }

    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let mut tables = self.tables.write().await;
        let expired: Vec<Uuid> = tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.payment_window_passed(now))
            .map(|b| b.id)
            .collect();
        for id in &expired {
            tables.bookings.remove(id);
        }
        Ok(expired)
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|booking| {
                let property = booking
                    .property_id
                    .and_then(|id| tables.properties.get(&id));
                matches_filter(booking, property, filter)
            })
            .cloned()
            .collect();

        let keys = page.sort_keys();
        matching.sort_by(|a, b| compare(a, b, &keys));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();

        Ok(PaginatedResponse {
            data,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

#[async_trait]
impl PropertyStore for InMemoryStore {
    async fn get_property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        Ok(self.tables.read().await.properties.get(&id).cloned())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_payment_profile(&self, user_id: Uuid) -> Result<Option<PaymentProfile>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .payment_profiles
            .get(&user_id)
            .cloned())
    }

    async fn save_payment_profile(&self, profile: PaymentProfile) -> Result<PaymentProfile, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .payment_profiles
            .entry(profile.user_id)
            .or_insert(profile);
        Ok(stored.clone())
    }
}
