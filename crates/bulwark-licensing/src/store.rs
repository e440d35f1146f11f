//! The license record store.

use crate::model::License;
use dashmap::DashMap;
use thiserror::Error;

/// Errors from a [`LicenseStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A license was saved without an id.
    #[error("license has no id")]
    MissingLicenseId,
    /// The backing store could not be reached.
    #[error("license store unavailable: {0}")]
    Unavailable(String),
}

/// Where licenses are kept.
pub trait LicenseStore: Send + Sync {
    /// Every license of an organization.
    fn find_by_organization(&self, organization_id: &str) -> Result<Vec<License>, StoreError>;

    /// One license of an organization.
    fn find(&self, organization_id: &str, license_id: &str) -> Result<Option<License>, StoreError>;

    /// Inserts or replaces a license, returning its id.
    fn save(&self, license: License) -> Result<String, StoreError>;

    /// Removes a license. Returns `true` if it existed.
    fn delete(&self, license_id: &str) -> Result<bool, StoreError>;
}

/// A [`LicenseStore`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLicenseStore {
    licenses: DashMap<String, License>,
}

impl InMemoryLicenseStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `licenses`.
    pub fn with_licenses(licenses: impl IntoIterator<Item = License>) -> Self {
        let store = Self::new();
        for license in licenses {
            store.licenses.insert(license.license_id.clone(), license);
        }
        store
    }

    /// Number of stored licenses.
    pub fn len(&self) -> usize {
        self.licenses.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty()
    }
}

impl LicenseStore for InMemoryLicenseStore {
    fn find_by_organization(&self, organization_id: &str) -> Result<Vec<License>, StoreError> {
        let mut licenses: Vec<License> = self
            .licenses
            .iter()
            .filter(|entry| entry.organization_id == organization_id)
            .map(|entry| entry.value().clone())
            .collect();
        licenses.sort_by(|a, b| a.license_id.cmp(&b.license_id));
        Ok(licenses)
    }

    fn find(&self, organization_id: &str, license_id: &str) -> Result<Option<License>, StoreError> {
        Ok(self
            .licenses
            .get(license_id)
            .filter(|entry| entry.organization_id == organization_id)
            .map(|entry| entry.value().clone()))
    }

    fn save(&self, license: License) -> Result<String, StoreError> {
        if license.license_id.is_empty() {
            return Err(StoreError::MissingLicenseId);
        }
        let id = license.license_id.clone();
        self.licenses.insert(id.clone(), license);
        Ok(id)
    }

    fn delete(&self, license_id: &str) -> Result<bool, StoreError> {
        Ok(self.licenses.remove(license_id).is_some())
    }
}
