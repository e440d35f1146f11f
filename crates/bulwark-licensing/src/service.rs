//! License operations with the remote lookups protected by the executor.

use crate::client::{ClientError, OrganizationClient};
use crate::fault::FaultInjector;
use crate::model::{License, Organization};
use crate::store::{LicenseStore, StoreError};
use bulwark_core::{ConfigError, OperationKey, ResilienceError};
use bulwark_executor::{CommandConfig, ResilientExecutor};
use bulwark_fallback::Fallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Key protecting the license listing for an organization.
pub const LICENSE_BY_ORG: &str = "license-by-org";

/// Key protecting calls to the organization service.
pub const ORGANIZATION_LOOKUP: &str = "organization-lookup";

/// Protection for [`LICENSE_BY_ORG`]: 30 concurrent, 10 queued, 2s deadline,
/// opening at 75% errors over at least 10 calls in a 15s window.
pub fn license_by_org_config() -> CommandConfig {
    CommandConfig {
        max_concurrent: 30,
        max_queue_depth: 10,
        timeout: Duration::from_millis(2000),
        request_volume_threshold: 10,
        error_threshold_percentage: 75,
        sleep_window: Duration::from_millis(7000),
        bucket_count: 5,
        bucket_duration: Duration::from_millis(3000),
    }
}

/// Protection for [`ORGANIZATION_LOOKUP`]: the same breaker as
/// [`license_by_org_config`] with a 500ms deadline.
pub fn organization_lookup_config() -> CommandConfig {
    CommandConfig {
        timeout: Duration::from_millis(500),
        ..license_by_org_config()
    }
}

/// Errors from [`LicenseService`].
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("license {license_id} not found for organization {organization_id}")]
    NotFound {
        organization_id: String,
        license_id: String,
    },

    /// The protected license listing failed and its fallback did too.
    #[error(transparent)]
    Licenses(ResilienceError<StoreError>),

    /// The protected organization lookup failed. It has no fallback.
    #[error(transparent)]
    Organization(ResilienceError<ClientError>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Licensing operations backed by a [`LicenseStore`] and an
/// [`OrganizationClient`].
///
/// Listing an organization's licenses and looking up an organization both run
/// through a [`ResilientExecutor`]; writes go straight to the store.
#[derive(Clone)]
pub struct LicenseService {
    store: Arc<dyn LicenseStore>,
    organizations: Arc<dyn OrganizationClient>,
    executor: ResilientExecutor,
    faults: Arc<FaultInjector>,
    comment: Arc<str>,
    license_by_org: OperationKey,
    organization_lookup: OperationKey,
}

impl LicenseService {
    /// Starts building a service over `store` and `organizations`.
    pub fn builder(
        store: Arc<dyn LicenseStore>,
        organizations: Arc<dyn OrganizationClient>,
    ) -> LicenseServiceBuilder {
        LicenseServiceBuilder {
            store,
            organizations,
            faults: Arc::new(FaultInjector::none()),
            comment: String::new(),
            license_by_org: license_by_org_config(),
            organization_lookup: organization_lookup_config(),
        }
    }

    /// The executor protecting this service's lookups.
    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    /// Lists an organization's licenses.
    ///
    /// When the listing fails, times out or is rejected, a single placeholder
    /// license is returned instead.
    pub async fn licenses_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<License>, LicenseError> {
        let store = Arc::clone(&self.store);
        let faults = Arc::clone(&self.faults);
        self.executor
            .invoke(
                &self.license_by_org,
                organization_id.to_string(),
                move |organization_id: String| async move {
                    faults.maybe_delay().await;
                    store.find_by_organization(&organization_id)
                },
            )
            .await
            .map_err(LicenseError::Licenses)
    }

    /// Fetches one license with its organization's details filled in.
    pub async fn license(
        &self,
        organization_id: &str,
        license_id: &str,
    ) -> Result<License, LicenseError> {
        let license = self
            .store
            .find(organization_id, license_id)?
            .ok_or_else(|| LicenseError::NotFound {
                organization_id: organization_id.to_string(),
                license_id: license_id.to_string(),
            })?;
        let organization = self.organization(organization_id).await?;
        Ok(license
            .with_organization(&organization)
            .with_comment(&*self.comment))
    }

    /// Looks up an organization through the protected client.
    pub async fn organization(&self, organization_id: &str) -> Result<Organization, LicenseError> {
        let organizations = Arc::clone(&self.organizations);
        self.executor
            .invoke(
                &self.organization_lookup,
                organization_id.to_string(),
                move |organization_id: String| async move {
                    organizations.lookup(&organization_id).await
                },
            )
            .await
            .map_err(LicenseError::Organization)
    }

    /// Stores a new license under a freshly generated id.
    pub fn save_license(&self, license: License) -> Result<License, LicenseError> {
        let license = license.with_id(uuid::Uuid::new_v4().to_string());
        self.store.save(license.clone())?;
        tracing::debug!(license_id = %license.license_id, "saved license");
        Ok(license)
    }

    /// Replaces a stored license, keeping its id.
    pub fn update_license(&self, license: License) -> Result<License, LicenseError> {
        self.store.save(license.clone())?;
        Ok(license)
    }

    /// Deletes a license. Returns `false` if there was nothing to delete.
    pub fn delete_license(&self, license_id: &str) -> Result<bool, LicenseError> {
        Ok(self.store.delete(license_id)?)
    }
}

impl fmt::Debug for LicenseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseService")
            .field("executor", &self.executor)
            .field("faults", &self.faults)
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`LicenseService`].
pub struct LicenseServiceBuilder {
    store: Arc<dyn LicenseStore>,
    organizations: Arc<dyn OrganizationClient>,
    faults: Arc<FaultInjector>,
    comment: String,
    license_by_org: CommandConfig,
    organization_lookup: CommandConfig,
}

impl LicenseServiceBuilder {
    /// Comment copied into every license returned by
    /// [`LicenseService::license`].
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Latency injected into the license listing.
    ///
    /// Default: none
    pub fn faults(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    /// Protection for [`LICENSE_BY_ORG`].
    ///
    /// Default: [`license_by_org_config`]
    pub fn license_by_org(mut self, config: CommandConfig) -> Self {
        self.license_by_org = config;
        self
    }

    /// Protection for [`ORGANIZATION_LOOKUP`].
    ///
    /// Default: [`organization_lookup_config`]
    pub fn organization_lookup(mut self, config: CommandConfig) -> Self {
        self.organization_lookup = config;
        self
    }

    /// Validates both configurations and builds the service.
    pub fn try_build(self) -> Result<LicenseService, ConfigError> {
        let executor = ResilientExecutor::builder()
            .command(LICENSE_BY_ORG, self.license_by_org)
            .command(ORGANIZATION_LOOKUP, self.organization_lookup)
            .fallback(
                LICENSE_BY_ORG,
                Fallback::<String, Vec<License>>::from_fn(|organization_id| {
                    vec![License::placeholder(organization_id)]
                }),
            )
            .on_fallback_applied(|key, outcome| {
                tracing::info!(key = %key, %outcome, "served fallback");
            })
            .try_build()?;

        Ok(LicenseService {
            store: self.store,
            organizations: self.organizations,
            executor,
            faults: self.faults,
            comment: self.comment.into(),
            license_by_org: OperationKey::from(LICENSE_BY_ORG),
            organization_lookup: OperationKey::from(ORGANIZATION_LOOKUP),
        })
    }

    /// Builds the service.
    ///
    /// # Panics
    ///
    /// Panics if either configuration is invalid.
    pub fn build(self) -> LicenseService {
        match self.try_build() {
            Ok(service) => service,
            Err(e) => panic!("invalid licensing configuration: {e}"),
        }
    }
}
