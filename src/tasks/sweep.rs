//! Periodic removal of bookings whose payment window closed

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::booking::BookingService;

/// Schedule `BookingService::sweep_expired` on `cron` (six-field, seconds first)
pub async fn start_expiration_sweep(
    booking_service: Arc<BookingService>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let booking_service = booking_service.clone();
        Box::pin(async move {
            match booking_service.sweep_expired().await {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!(count = removed.len(), "Expired unpaid bookings swept");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Expiration sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %cron, "Expiration sweep scheduled");
    Ok(scheduler)
}
