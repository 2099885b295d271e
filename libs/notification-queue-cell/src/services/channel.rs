use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::services::AppointmentNotifier;
use crate::{AppointmentEvent, NotificationError};

/// In-process notifier backed by an unbounded channel; the receiving half is
/// drained by whatever worker the deployment runs.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<AppointmentEvent>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppointmentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AppointmentNotifier for ChannelNotifier {
    async fn publish(&self, event: AppointmentEvent) -> Result<(), NotificationError> {
        self.sender.send(event).map_err(|_| NotificationError::ChannelClosed)
    }
}
