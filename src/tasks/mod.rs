//! Background task queue
//!
//! Request handlers enqueue work without waiting for it. A single `TaskWorker`
//! drains the queue; failed tasks are logged and never retried.

mod sweep;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notifications::{render, Notification, Notifier, Recipient};
use crate::store::{AccountStore, BookingStore, PropertyStore};

pub use sweep::start_expiration_sweep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundTask {
    DeleteExpiredBooking { booking_id: Uuid },
    Notify(Notification),
}

/// Sending half of the task queue
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<BackgroundTask>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BackgroundTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Fire-and-forget
    pub fn enqueue(&self, task: BackgroundTask) {
        tracing::debug!(task = ?task, "Task enqueued");
        if let Err(e) = self.sender.send(task) {
            tracing::error!(task = ?e.0, "Task queue closed, dropping task");
        }
    }
}

/// Executes queued tasks
pub struct TaskWorker {
    receiver: mpsc::UnboundedReceiver<BackgroundTask>,
    bookings: Arc<dyn BookingStore>,
    properties: Arc<dyn PropertyStore>,
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    from_email: String,
}

impl TaskWorker {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<BackgroundTask>,
        bookings: Arc<dyn BookingStore>,
        properties: Arc<dyn PropertyStore>,
        accounts: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        from_email: String,
    ) -> Self {
        Self {
            receiver,
            bookings,
            properties,
            accounts,
            notifier,
            from_email,
        }
    }

    /// Run until every `TaskQueue` handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Task worker started");
        while let Some(task) = self.receiver.recv().await {
            self.handle(task).await;
        }
        tracing::info!("Task worker stopped");
    }

    /// Execute everything queued so far and return how many tasks ran
    pub async fn drain(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(task) = self.receiver.try_recv() {
            self.handle(task).await;
            executed += 1;
        }
        executed
    }

    async fn handle(&self, task: BackgroundTask) {
        if let Err(e) = self.execute(&task).await {
            tracing::error!(task = ?task, error = %format!("{:#}", e), "Background task failed");
        }
    }

    async fn execute(&self, task: &BackgroundTask) -> Result<()> {
        match task {
            BackgroundTask::DeleteExpiredBooking { booking_id } => {
                let removed = self.bookings.delete_booking(*booking_id).await?;
                if removed {
                    tracing::info!(booking_id = %booking_id, "Expired unpaid booking deleted");
                } else {
                    tracing::debug!(booking_id = %booking_id, "Expired booking already gone");
                }
                Ok(())
            }
            BackgroundTask::Notify(notification) => self.notify(notification).await,
        }
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let booking = self
            .bookings
            .get_booking(notification.booking_id)
            .await?
            .context("booking no longer exists")?;
        let property_id = booking
            .property_id
            .context("booking has no property")?;
        let property = self
            .properties
            .get_property(property_id)
            .await?
            .context("property no longer exists")?;

        let user_id = match notification.recipient {
            Recipient::Renter => booking.user_id,
            Recipient::Owner => property.owner_id,
        };
        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .with_context(|| format!("user {} not found", user_id))?;

        let email = render(notification, &self.from_email, &user, &booking, &property);
        self.notifier.send(&email).await?;

        tracing::info!(
            booking_id = %booking.id,
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            "Notification delivered"
        );
        Ok(())
    }
}
