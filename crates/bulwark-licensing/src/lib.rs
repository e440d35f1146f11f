//! A licensing service whose remote lookups are protected by bulwark.
//!
//! [`LicenseService`] lists an organization's licenses from a
//! [`LicenseStore`] and enriches single licenses with details from an
//! [`OrganizationClient`]. Both lookups run through a
//! [`ResilientExecutor`](bulwark_executor::ResilientExecutor) under their own
//! keys ([`LICENSE_BY_ORG`] and [`ORGANIZATION_LOOKUP`]), each with its own
//! bulkhead, deadline and circuit breaker. A failed license listing falls back
//! to a single placeholder license.
//!
//! [`FaultInjector`] slows a share of calls down so the protections can be
//! watched at work; `licensing-demo` runs the whole thing.
//!
//! ```rust
//! use bulwark_licensing::{
//!     InMemoryLicenseStore, License, LicenseService, StaticOrganizationClient,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryLicenseStore::with_licenses([
//!     License::new("org-1", "CustomerPro", "user").with_id("lic-1"),
//! ]);
//! let service = LicenseService::builder(
//!     Arc::new(store),
//!     Arc::new(StaticOrganizationClient::new([])),
//! )
//! .build();
//!
//! let licenses = service.licenses_by_organization("org-1").await.unwrap();
//! assert_eq!(licenses[0].license_id, "lic-1");
//! # }
//! ```

pub mod client;
pub mod events;
pub mod fault;
pub mod model;
pub mod service;
pub mod store;

pub use client::{ClientError, OrganizationClient, StaticOrganizationClient};
pub use events::{ChangeAction, OrganizationChange, OrganizationChangeSink};
pub use fault::FaultInjector;
pub use model::{License, Organization, PLACEHOLDER_LICENSE_ID, PLACEHOLDER_PRODUCT_NAME};
pub use service::{
    license_by_org_config, organization_lookup_config, LicenseError, LicenseService,
    LicenseServiceBuilder, LICENSE_BY_ORG, ORGANIZATION_LOOKUP,
};
pub use store::{InMemoryLicenseStore, LicenseStore, StoreError};
