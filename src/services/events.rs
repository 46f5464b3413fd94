//! Event system for record operations
//!
//! Services emit an event after each committed write. Subscribers receive
//! them over a tokio broadcast channel; the default listener writes them to
//! the tracing log as an audit trail.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Beneficiary register a record event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Scholarship,
    Humanitarian,
}

impl Register {
    pub fn as_str(&self) -> &'static str {
        match self {
            Register::Scholarship => "scholarship",
            Register::Humanitarian => "humanitarian",
        }
    }
}

/// Record events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum RecordsEvent {
    ProjectCreated {
        id: i64,
        project_name: String,
        created_by: Option<i64>,
    },
    ProjectUpdated {
        id: i64,
    },
    ProjectDeleted {
        id: i64,
    },
    ProgressRecorded {
        project_id: i64,
        progress_percentage: u8,
        logged_by: i64,
    },
    BeneficiaryCreated {
        register: Register,
        id: i64,
        created_by: i64,
    },
    BeneficiaryUpdated {
        register: Register,
        id: i64,
    },
    BeneficiaryDeleted {
        register: Register,
        id: i64,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RecordsEvent);
}

/// Event bus for broadcasting record events
pub struct EventBus {
    sender: broadcast::Sender<RecordsEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: RecordsEvent) {
        trace!(event = ?event, "Emitting records event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordsEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit listener that writes every event to the log
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &RecordsEvent) {
        match event {
            RecordsEvent::ProjectCreated { id, project_name, created_by } => {
                info!(id, project_name = %project_name, created_by = ?created_by, "Project created");
            }
            RecordsEvent::ProjectUpdated { id } => {
                info!(id, "Project updated");
            }
            RecordsEvent::ProjectDeleted { id } => {
                info!(id, "Project deleted");
            }
            RecordsEvent::ProgressRecorded { project_id, progress_percentage, logged_by } => {
                info!(project_id, progress = progress_percentage, logged_by, "Progress recorded");
            }
            RecordsEvent::BeneficiaryCreated { register, id, created_by } => {
                info!(register = register.as_str(), id, created_by, "Beneficiary created");
            }
            RecordsEvent::BeneficiaryUpdated { register, id } => {
                info!(register = register.as_str(), id, "Beneficiary updated");
            }
            RecordsEvent::BeneficiaryDeleted { register, id } => {
                info!(register = register.as_str(), id, "Beneficiary deleted");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(RecordsEvent::ProgressRecorded {
            project_id: 4,
            progress_percentage: 55,
            logged_by: 1,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(event, RecordsEvent::ProgressRecorded {
            project_id: 4,
            progress_percentage: 55,
            logged_by: 1,
        });
    }

    #[test]
    fn test_register_names() {
        assert_eq!(Register::Scholarship.as_str(), "scholarship");
        assert_eq!(Register::Humanitarian.as_str(), "humanitarian");
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(RecordsEvent::ProjectDeleted { id: 1 });
    }
}
