//! Licensing records.

use serde::{Deserialize, Serialize};

/// Identifier of the placeholder license returned when licenses cannot be
/// looked up.
pub const PLACEHOLDER_LICENSE_ID: &str = "0000000-00-00000";

/// Product name of the placeholder license.
pub const PLACEHOLDER_PRODUCT_NAME: &str = "Sorry no licensing information currently available";

/// A software license held by an organization.
///
/// The organization and contact fields are not stored; they are filled in
/// from the organization service when a single license is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub license_id: String,
    pub organization_id: String,
    pub product_name: String,
    pub license_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl License {
    /// A license for `organization_id` with no id assigned yet.
    pub fn new(
        organization_id: impl Into<String>,
        product_name: impl Into<String>,
        license_type: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            product_name: product_name.into(),
            license_type: license_type.into(),
            ..Default::default()
        }
    }

    /// Sets the license id.
    pub fn with_id(mut self, license_id: impl Into<String>) -> Self {
        self.license_id = license_id.into();
        self
    }

    /// Stand-in returned when an organization's licenses are unavailable.
    pub fn placeholder(organization_id: impl Into<String>) -> Self {
        Self {
            license_id: PLACEHOLDER_LICENSE_ID.to_string(),
            organization_id: organization_id.into(),
            product_name: PLACEHOLDER_PRODUCT_NAME.to_string(),
            ..Default::default()
        }
    }

    /// Returns `true` for [`placeholder`](Self::placeholder) licenses.
    pub fn is_placeholder(&self) -> bool {
        self.license_id == PLACEHOLDER_LICENSE_ID
    }

    /// Copies the organization's name and contact details into the license.
    pub fn with_organization(mut self, org: &Organization) -> Self {
        self.organization_name = Some(org.name.clone());
        self.contact_name = Some(org.contact_name.clone());
        self.contact_email = Some(org.contact_email.clone());
        self.contact_phone = Some(org.contact_phone.clone());
        self
    }

    /// Sets the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// An organization as known to the organization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_license() {
        let license = License::placeholder("e254f8c-c442-4ebe-a82a-e2fc1d1ff78a");
        assert!(license.is_placeholder());
        assert_eq!(license.product_name, PLACEHOLDER_PRODUCT_NAME);
        assert_eq!(license.organization_id, "e254f8c-c442-4ebe-a82a-e2fc1d1ff78a");
    }

    #[test]
    fn merges_organization_details() {
        let org = Organization {
            id: "org-1".into(),
            name: "Customer Crm Co".into(),
            contact_name: "Mark Balster".into(),
            contact_email: "mark.balster@custcrmco.com".into(),
            contact_phone: "823-555-1212".into(),
        };
        let license = License::new("org-1", "CustomerPro", "user")
            .with_organization(&org)
            .with_comment("I AM THE DEFAULT.");

        assert_eq!(license.organization_name.as_deref(), Some("Customer Crm Co"));
        assert_eq!(license.contact_phone.as_deref(), Some("823-555-1212"));
        assert_eq!(license.comment.as_deref(), Some("I AM THE DEFAULT."));
    }

    #[test]
    fn unmerged_fields_are_omitted_from_json() {
        let json = serde_json::to_value(License::new("org-1", "CustomerPro", "user")).unwrap();
        assert!(json.get("contact_name").is_none());
        assert_eq!(json["product_name"], "CustomerPro");
    }
}
