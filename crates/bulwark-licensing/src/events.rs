//! Inbound organization change notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What happened to an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Save,
    Update,
    Delete,
}

/// A notification that an organization changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationChange {
    pub action: ChangeAction,
    pub organization_id: String,
    pub correlation_id: String,
}

impl OrganizationChange {
    pub fn new(
        action: ChangeAction,
        organization_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            action,
            organization_id: organization_id.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// Consumes organization change notifications and logs them.
#[derive(Debug)]
pub struct OrganizationChangeSink {
    rx: mpsc::Receiver<OrganizationChange>,
}

impl OrganizationChangeSink {
    /// Creates a sink and the sender feeding it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<OrganizationChange>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }

    /// Logs notifications until every sender is dropped. Returns how many
    /// were received.
    pub async fn run(mut self) -> usize {
        let mut received = 0;
        while let Some(change) = self.rx.recv().await {
            received += 1;
            tracing::debug!(
                organization_id = %change.organization_id,
                action = ?change.action,
                correlation_id = %change.correlation_id,
                "Received an event for organization"
            );
        }
        tracing::debug!(received, "organization change stream closed");
        received
    }
}
