//! The organization service client.

use crate::fault::FaultInjector;
use crate::model::Organization;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from an [`OrganizationClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The organization service has no such organization.
    #[error("organization {0} not found")]
    NotFound(String),
    /// The organization service could not be reached.
    #[error("organization service unavailable: {0}")]
    Unavailable(String),
}

/// Looks up organizations in the remote organization service.
#[async_trait]
pub trait OrganizationClient: Send + Sync {
    /// Fetches one organization.
    async fn lookup(&self, organization_id: &str) -> Result<Organization, ClientError>;
}

/// An [`OrganizationClient`] answering from a fixed table, with optional
/// injected latency.
#[derive(Debug, Default)]
pub struct StaticOrganizationClient {
    organizations: HashMap<String, Organization>,
    faults: Arc<FaultInjector>,
}

impl StaticOrganizationClient {
    /// Creates a client knowing `organizations`.
    pub fn new(organizations: impl IntoIterator<Item = Organization>) -> Self {
        Self {
            organizations: organizations
                .into_iter()
                .map(|org| (org.id.clone(), org))
                .collect(),
            faults: Arc::new(FaultInjector::none()),
        }
    }

    /// Delays lookups according to `faults`.
    pub fn with_faults(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = faults;
        self
    }
}

#[async_trait]
impl OrganizationClient for StaticOrganizationClient {
    async fn lookup(&self, organization_id: &str) -> Result<Organization, ClientError> {
        self.faults.maybe_delay().await;
        self.organizations
            .get(organization_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(organization_id.to_string()))
    }
}
