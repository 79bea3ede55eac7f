use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::application::ports::{Notifier, NotifierError, RoomEvent};

/// Fans room events out to in-process subscribers such as SSE listeners.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<RoomEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn emit(&self, event: RoomEvent) -> Result<(), NotifierError> {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(receivers, "Room event broadcast");
                Ok(())
            }
            // Nobody is listening; the event is dropped like a socket emit to an empty room.
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(room = %event.room, event = %event.event, "No listeners for room event");
                Ok(())
            }
        }
    }
}
