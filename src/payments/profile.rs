use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::PaymentGateway;
use crate::booking::BookingError;
use crate::models::PaymentProfile;
use crate::store::AccountStore;

/// Registers users with the payment provider
pub struct PaymentProfileService {
    accounts: Arc<dyn AccountStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentProfileService {
    pub fn new(accounts: Arc<dyn AccountStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { accounts, gateway }
    }

    /// Return the user's payment profile, creating the provider customer on first use
    pub async fn ensure_profile(&self, user_id: Uuid) -> Result<PaymentProfile, BookingError> {
        if let Some(profile) = self.accounts.get_payment_profile(user_id).await? {
            return Ok(profile);
        }

        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound)?;

        let customer_id = self.gateway.create_customer(&user.email).await?;
        tracing::info!(user_id = %user_id, customer_id = %customer_id, "Payment profile created");

        let profile = self
            .accounts
            .save_payment_profile(PaymentProfile {
                user_id,
                customer_id,
                created_at: Utc::now(),
            })
            .await?;

        Ok(profile)
    }
}
