use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Bounded channel handle shared by every service
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

    /// Publishes after a commit. Delivery failures are logged, never surfaced,
    /// since the write they describe has already happened.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Domain events emitted after successful writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SaleCreated {
        sale_id: Uuid,
        company_id: Uuid,
        warranty_count: usize,
    },
    WarrantyCreated {
        warranty_id: Uuid,
        company_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    WarrantyDeactivated {
        warranty_id: Uuid,
        company_id: Uuid,
    },
    ServiceOpened {
        service_id: Uuid,
        warranty_id: Uuid,
        company_id: Uuid,
    },
    ServiceAdvanced {
        service_id: Uuid,
        company_id: Uuid,
        from: String,
        to: String,
    },
    MemberInvited {
        company_id: Uuid,
        user_id: Uuid,
        role: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SaleCreated { .. } => "sale_created",
            Event::WarrantyCreated { .. } => "warranty_created",
            Event::WarrantyDeactivated { .. } => "warranty_deactivated",
            Event::ServiceOpened { .. } => "service_opened",
            Event::ServiceAdvanced { .. } => "service_advanced",
            Event::MemberInvited { .. } => "member_invited",
        }
    }
}

/// Creates the event channel sized from configuration
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

/// Drains the channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        crate::metrics::record_event(event.name());
        match &event {
            Event::SaleCreated {
                sale_id,
                company_id,
                warranty_count,
            } => info!(%sale_id, %company_id, warranty_count, "sale created"),
            Event::WarrantyCreated {
                warranty_id,
                company_id,
                expires_at,
            } => info!(%warranty_id, %company_id, %expires_at, "warranty created"),
            Event::WarrantyDeactivated {
                warranty_id,
                company_id,
            } => info!(%warranty_id, %company_id, "warranty deactivated"),
            Event::ServiceOpened {
                service_id,
                warranty_id,
                company_id,
            } => info!(%service_id, %warranty_id, %company_id, "service opened"),
            Event::ServiceAdvanced {
                service_id,
                company_id,
                from,
                to,
            } => info!(%service_id, %company_id, from = %from, to = %to, "service advanced"),
            Event::MemberInvited {
                company_id,
                user_id,
                role,
            } => info!(%company_id, %user_id, role = %role, "member invited"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_events_reach_the_receiver() {
        let (sender, mut rx) = channel(4);
        let id = Uuid::new_v4();
        sender
            .publish(Event::WarrantyDeactivated {
                warranty_id: id,
                company_id: id,
            })
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "warranty_deactivated");
    }

    #[tokio::test]
    async fn publish_after_receiver_drop_does_not_fail() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender
            .publish(Event::MemberInvited {
                company_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                role: "seller".into(),
            })
            .await;
        assert!(sender.send(Event::WarrantyDeactivated {
            warranty_id: Uuid::nil(),
            company_id: Uuid::nil(),
        })
        .await
        .is_err());
    }
}
