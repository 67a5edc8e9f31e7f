//! Multi-tenancy over the HTTP surface: header resolution, isolation
//! and the enabled flag.

mod common;

use common::{send, test_app_with_tenancy};
use kitefhir_storage::{TenantRecord, TenantStore};
use serde_json::json;
use uuid::Uuid;

async fn seed_tenants(
    store: &kitefhir_db_memory::MemoryTenantStore,
) -> (Uuid, Uuid, Uuid) {
    let t1 = Uuid::new_v4();
    let t2 = Uuid::new_v4();
    let disabled = Uuid::new_v4();
    store.save(TenantRecord::new(t1, "t1")).await.unwrap();
    store.save(TenantRecord::new(t2, "t2")).await.unwrap();
    store
        .save(TenantRecord::new(disabled, "t-off").disabled())
        .await
        .unwrap();
    (t1, t2, disabled)
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let (app, tenant_store) = test_app_with_tenancy(true);
    let (t1, t2, _) = seed_tenants(&tenant_store).await;
    let t1_header = t1.to_string();
    let t2_header = t2.to_string();

    let (status, _, created) = send(
        &app,
        "POST",
        "/fhir/r5/Patient",
        Some(json!({"resourceType": "Patient", "name": [{"family": "Isolated"}]})),
        &[("x-tenant-id", t1_header.as_str())],
    )
    .await;
    assert_eq!(status, 201);
    let id = created.unwrap()["id"].as_str().unwrap().to_string();

    // a read with the other tenant's header is a plain 404, not 403
    let (status, _, body) = send(
        &app,
        "GET",
        &format!("/fhir/r5/Patient/{id}"),
        None,
        &[("x-tenant-id", t2_header.as_str())],
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-found");

    // listing all patients for the other tenant is empty
    let (status, _, bundle) = send(
        &app,
        "GET",
        "/fhir/r5/Patient",
        None,
        &[("x-tenant-id", t2_header.as_str())],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(bundle.unwrap()["total"], 0);

    // the owner still sees it
    let (status, _, _) = send(
        &app,
        "GET",
        &format!("/fhir/r5/Patient/{id}"),
        None,
        &[("x-tenant-id", t1_header.as_str())],
    )
    .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn disabled_tenant_is_403() {
    let (app, tenant_store) = test_app_with_tenancy(true);
    let (_, _, disabled) = seed_tenants(&tenant_store).await;
    let header = disabled.to_string();

    let (status, _, body) = send(
        &app,
        "GET",
        "/fhir/r5/Patient",
        None,
        &[("x-tenant-id", header.as_str())],
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(body.unwrap()["issue"][0]["code"], "forbidden");
}

#[tokio::test]
async fn unknown_tenant_is_404() {
    let (app, tenant_store) = test_app_with_tenancy(true);
    seed_tenants(&tenant_store).await;
    let header = Uuid::new_v4().to_string();

    let (status, _, body) = send(
        &app,
        "GET",
        "/fhir/r5/Patient",
        None,
        &[("x-tenant-id", header.as_str())],
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-found");
}

#[tokio::test]
async fn malformed_or_missing_header_is_400() {
    let (app, tenant_store) = test_app_with_tenancy(true);
    seed_tenants(&tenant_store).await;

    let (status, _, body) = send(
        &app,
        "GET",
        "/fhir/r5/Patient",
        None,
        &[("x-tenant-id", "not-a-uuid")],
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body.unwrap()["issue"][0]["code"], "invalid");

    let (status, _, _) = send(&app, "GET", "/fhir/r5/Patient", None, &[]).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn single_tenant_mode_ignores_header() {
    let (app, _) = test_app_with_tenancy(false);
    let (status, _, _) = send(
        &app,
        "GET",
        "/fhir/r5/Patient",
        None,
        &[("x-tenant-id", "anything-goes")],
    )
    .await;
    assert_eq!(status, 200);
}
