use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted after a unit of work commits. Consumers
/// (notifications, report caches, sync jobs) subscribe to the processing
/// loop; the engine itself never reacts to its own events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockTransferred {
        source_bucket_id: Uuid,
        destination_bucket_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        correlation_id: Uuid,
    },
    StockConditionChanged {
        source_bucket_id: Uuid,
        destination_bucket_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        new_condition: String,
        correlation_id: Uuid,
    },
    StockAdjusted {
        bucket_id: Uuid,
        product_id: Uuid,
        field: String,
        delta: i32,
        quantity_before: i32,
        quantity_after: i32,
        reason_code: String,
    },
    StockReceived {
        bucket_id: Uuid,
        product_id: Uuid,
        field: String,
        quantity: i32,
        reason_code: String,
    },
    BucketRemoved {
        bucket_id: Uuid,
        product_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Convenience constructor for an event channel plus its sender handle.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Downstream consumers hang
/// their handlers off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockTransferred {
                product_id,
                quantity,
                correlation_id,
                ..
            } => {
                info!(
                    product_id = %product_id,
                    quantity = %quantity,
                    correlation_id = %correlation_id,
                    "Stock transferred"
                );
            }
            Event::StockConditionChanged {
                product_id,
                quantity,
                new_condition,
                ..
            } => {
                info!(
                    product_id = %product_id,
                    quantity = %quantity,
                    new_condition = %new_condition,
                    "Stock condition changed"
                );
            }
            Event::StockAdjusted {
                bucket_id,
                delta,
                reason_code,
                ..
            } => {
                info!(
                    bucket_id = %bucket_id,
                    delta = %delta,
                    reason_code = %reason_code,
                    "Stock adjusted"
                );
            }
            Event::StockReceived {
                bucket_id,
                quantity,
                reason_code,
                ..
            } => {
                info!(
                    bucket_id = %bucket_id,
                    quantity = %quantity,
                    reason_code = %reason_code,
                    "Stock received"
                );
            }
            Event::BucketRemoved {
                bucket_id,
                product_id,
            } => {
                info!(
                    bucket_id = %bucket_id,
                    product_id = %product_id,
                    "Empty bucket removed"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
