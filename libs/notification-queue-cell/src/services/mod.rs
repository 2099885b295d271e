pub mod channel;
pub mod producer;

pub use channel::ChannelNotifier;
pub use producer::RedisNotificationProducer;

use async_trait::async_trait;

use crate::{AppointmentEvent, NotificationError};

/// Outbound collaborator for appointment events. Callers treat delivery as
/// fire-and-forget: an error here never changes a booking's outcome.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn publish(&self, event: AppointmentEvent) -> Result<(), NotificationError>;
}
