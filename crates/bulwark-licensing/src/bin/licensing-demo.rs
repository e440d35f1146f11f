//! Runs the licensing service against a slow store and prints what the
//! protections did.
//!
//! ```text
//! RUST_LOG=bulwark_licensing=debug,bulwark_executor=debug cargo run -p bulwark-licensing
//! ```

use bulwark_licensing::{
    ChangeAction, FaultInjector, InMemoryLicenseStore, License, LicenseService, Organization,
    OrganizationChange, OrganizationChangeSink, StaticOrganizationClient, LICENSE_BY_ORG,
    ORGANIZATION_LOOKUP,
};
use bulwark_core::OperationKey;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ORGANIZATION_ID: &str = "e254f8c-c442-4ebe-a82a-e2fc1d1ff78a";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = InMemoryLicenseStore::with_licenses([
        License::new(ORGANIZATION_ID, "CustomerPro", "user")
            .with_id("f3831f8c-c338-4ebe-a82a-e2fc1d1ff78a"),
        License::new(ORGANIZATION_ID, "suitability-plus", "user")
            .with_id("t9876f8c-c338-4abc-zf6a-ttt1"),
    ]);
    let organizations = StaticOrganizationClient::new([Organization {
        id: ORGANIZATION_ID.to_string(),
        name: "HR-PowerSuite".to_string(),
        contact_name: "Doug Drewry".to_string(),
        contact_email: "doug.drewry@hr.com".to_string(),
        contact_phone: "920-555-1212".to_string(),
    }]);

    // Shorter than the 11s default, still past the 2s deadline.
    let service = LicenseService::builder(Arc::new(store), Arc::new(organizations))
        .comment("I AM THE DEFAULT.")
        .faults(Arc::new(FaultInjector::with_probability(
            1.0 / 3.0,
            Duration::from_secs(3),
        )))
        .build();

    let (changes, sink) = OrganizationChangeSink::channel(16);
    let sink = tokio::spawn(sink.run());

    let mut calls = Vec::new();
    for _ in 0..24 {
        let service = service.clone();
        calls.push(tokio::spawn(async move {
            service.licenses_by_organization(ORGANIZATION_ID).await
        }));
    }

    let (mut served, mut placeholders) = (0, 0);
    for call in calls {
        let licenses = call.await??;
        if licenses.iter().any(License::is_placeholder) {
            placeholders += 1;
        } else {
            served += 1;
        }
    }
    println!("license listing: {served} served, {placeholders} placeholders");

    match service
        .license(ORGANIZATION_ID, "f3831f8c-c338-4ebe-a82a-e2fc1d1ff78a")
        .await
    {
        Ok(license) => println!("{}", serde_json::to_string_pretty(&license)?),
        Err(e) => println!("license lookup failed: {e}"),
    }

    changes
        .send(OrganizationChange::new(
            ChangeAction::Update,
            ORGANIZATION_ID,
            uuid::Uuid::new_v4().to_string(),
        ))
        .await?;
    drop(changes);
    sink.await?;

    let executor = service.executor();
    for key in [LICENSE_BY_ORG, ORGANIZATION_LOOKUP].map(OperationKey::from) {
        let snapshot = executor.snapshot(&key);
        println!(
            "{key}: breaker {}, {} calls, error rate {:.2}",
            executor.breaker_state(&key).as_str(),
            snapshot.total,
            snapshot.error_rate,
        );
    }
    Ok(())
}
