//! End-to-end CRUD and search over the in-memory backend.

mod common;

use common::{send, test_app};
use serde_json::json;

fn patient() -> serde_json::Value {
    json!({
        "resourceType": "Patient",
        "name": [{ "family": "Smith", "given": ["John"] }],
        "gender": "male",
        "birthDate": "1980-01-15"
    })
}

#[tokio::test]
async fn create_then_read_patient_r5() {
    let app = test_app();

    let (status, headers, body) =
        send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    assert_eq!(status, 201);
    let body = body.unwrap();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["meta"]["versionId"], "1");

    let location = headers.get("location").unwrap().to_str().unwrap();
    assert_eq!(location, format!("Patient/{id}/_history/1"));
    assert_eq!(headers.get("etag").unwrap(), "W/\"1\"");
    assert_eq!(headers.get("x-fhir-version").unwrap(), "R5");

    let (status, headers, read_body) =
        send(&app, "GET", &format!("/fhir/r5/Patient/{id}"), None, &[]).await;
    assert_eq!(status, 200);
    assert_eq!(headers.get("x-fhir-version").unwrap(), "R5");
    assert!(headers.get("last-modified").is_some());
    let read_body = read_body.unwrap();
    assert_eq!(read_body["id"], id.as_str());
    assert_eq!(read_body["name"][0]["family"], "Smith");
    assert_eq!(read_body, body);
}

#[tokio::test]
async fn unversioned_url_uses_default_version() {
    let app = test_app();
    let (status, headers, _) = send(&app, "POST", "/fhir/Patient", Some(patient()), &[]).await;
    assert_eq!(status, 201);
    assert_eq!(headers.get("x-fhir-version").unwrap(), "R5");
}

#[tokio::test]
async fn unsupported_version_for_type_is_rejected() {
    let app = test_app();
    // Observation is configured for R5 only
    let (status, _, body) = send(
        &app,
        "POST",
        "/fhir/r4b/Observation",
        Some(json!({"resourceType": "Observation"})),
        &[],
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-supported");
}

#[tokio::test]
async fn disabled_interaction_is_405() {
    let app = test_app();
    let (status, _, created) = send(
        &app,
        "POST",
        "/fhir/r5/Appointment",
        Some(json!({"resourceType": "Appointment"})),
        &[],
    )
    .await;
    assert_eq!(status, 201);
    let id = created.unwrap()["id"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app,
        "DELETE",
        &format!("/fhir/r5/Appointment/{id}"),
        None,
        &[],
    )
    .await;
    assert_eq!(status, 405);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-supported");
}

#[tokio::test]
async fn unknown_resource_type_is_404() {
    let app = test_app();
    let (status, _, body) = send(&app, "GET", "/fhir/r5/Widget/abc", None, &[]).await;
    assert_eq!(status, 404);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-found");
}

#[tokio::test]
async fn update_bumps_version_and_if_match_conflicts() {
    let app = test_app();
    let (_, _, created) = send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let id = created.unwrap()["id"].as_str().unwrap().to_string();
    let url = format!("/fhir/r5/Patient/{id}");

    let mut updated = patient();
    updated["id"] = json!(id);
    updated["name"][0]["family"] = json!("Smythe");
    let (status, headers, body) = send(&app, "PUT", &url, Some(updated.clone()), &[]).await;
    assert_eq!(status, 200);
    assert_eq!(headers.get("etag").unwrap(), "W/\"2\"");
    assert_eq!(body.unwrap()["meta"]["versionId"], "2");

    // stale If-Match against version 2
    let (status, _, body) = send(
        &app,
        "PUT",
        &url,
        Some(updated),
        &[("if-match", "W/\"1\"")],
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body.unwrap()["issue"][0]["code"], "conflict");
}

#[tokio::test]
async fn put_with_identical_body_is_idempotent_in_content() {
    let app = test_app();
    let (_, _, created) = send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let created = created.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let url = format!("/fhir/r5/Patient/{id}");

    let mut body = patient();
    body["id"] = json!(id);
    let (_, _, v2) = send(&app, "PUT", &url, Some(body.clone()), &[]).await;
    let (_, _, v3) = send(&app, "PUT", &url, Some(body), &[]).await;
    let v2 = v2.unwrap();
    let v3 = v3.unwrap();
    assert_eq!(v2["meta"]["versionId"], "2");
    assert_eq!(v3["meta"]["versionId"], "3");
    // stable content apart from meta
    assert_eq!(v2["name"], v3["name"]);
    assert_eq!(v2["birthDate"], v3["birthDate"]);
}

#[tokio::test]
async fn delete_then_read_is_410_and_history_survives() {
    let app = test_app();
    let (_, _, created) = send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let id = created.unwrap()["id"].as_str().unwrap().to_string();
    let url = format!("/fhir/r5/Patient/{id}");

    let mut body = patient();
    body["id"] = json!(id);
    send(&app, "PUT", &url, Some(body.clone()), &[]).await;
    send(&app, "PUT", &url, Some(body), &[]).await;

    let (status, _, _) = send(&app, "DELETE", &url, None, &[]).await;
    assert_eq!(status, 204);

    let (status, _, body) = send(&app, "GET", &url, None, &[]).await;
    assert_eq!(status, 410);
    assert_eq!(body.unwrap()["issue"][0]["code"], "deleted");

    // history: C/U/U/D → POST, PUT, PUT, DELETE newest-first with 4..1
    let (status, _, history) = send(&app, "GET", &format!("{url}/_history"), None, &[]).await;
    assert_eq!(status, 200);
    let history = history.unwrap();
    assert_eq!(history["type"], "history");
    let entries = history["entry"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let methods: Vec<&str> = entries
        .iter()
        .map(|e| e["request"]["method"].as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["DELETE", "PUT", "PUT", "POST"]);
    let etags: Vec<&str> = entries
        .iter()
        .map(|e| e["response"]["etag"].as_str().unwrap())
        .collect();
    assert_eq!(etags, vec!["W/\"4\"", "W/\"3\"", "W/\"2\"", "W/\"1\""]);
}

#[tokio::test]
async fn vread_returns_old_versions_and_tombstone_marker() {
    let app = test_app();
    let (_, _, created) = send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let id = created.unwrap()["id"].as_str().unwrap().to_string();
    let url = format!("/fhir/r5/Patient/{id}");
    send(&app, "DELETE", &url, None, &[]).await;

    let (status, _, v1) = send(&app, "GET", &format!("{url}/_history/1"), None, &[]).await;
    assert_eq!(status, 200);
    assert_eq!(v1.unwrap()["name"][0]["family"], "Smith");

    // the tombstone version is reachable through vread
    let (status, _, marker) = send(&app, "GET", &format!("{url}/_history/2"), None, &[]).await;
    assert_eq!(status, 200);
    assert_eq!(marker.unwrap()["resourceType"], "Patient");

    let (status, _, _) = send(&app, "GET", &format!("{url}/_history/9"), None, &[]).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn patch_via_json_patch() {
    let app = test_app();
    let (_, _, created) = send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let id = created.unwrap()["id"].as_str().unwrap().to_string();

    let (status, _, patched) = send(
        &app,
        "PATCH",
        &format!("/fhir/r5/Patient/{id}"),
        Some(json!([{ "op": "replace", "path": "/gender", "value": "female" }])),
        &[],
    )
    .await;
    assert_eq!(status, 200);
    let patched = patched.unwrap();
    assert_eq!(patched["gender"], "female");
    assert_eq!(patched["meta"]["versionId"], "2");
    // unchanged fields preserved
    assert_eq!(patched["name"][0]["family"], "Smith");
    assert_eq!(patched["birthDate"], "1980-01-15");
}

#[tokio::test]
async fn search_pagination_walks_all_pages() {
    let app = test_app();
    for i in 0..25 {
        let mut body = patient();
        body["name"][0]["given"] = json!([format!("Given{i}")]);
        send(&app, "POST", "/fhir/r5/Patient", Some(body), &[]).await;
    }

    let (status, _, page1) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?family=Smith&_count=10",
        None,
        &[],
    )
    .await;
    assert_eq!(status, 200);
    let page1 = page1.unwrap();
    assert_eq!(page1["type"], "searchset");
    assert_eq!(page1["total"], 25);
    assert_eq!(page1["entry"].as_array().unwrap().len(), 10);

    let relations: Vec<&str> = page1["link"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["relation"].as_str().unwrap())
        .collect();
    assert!(relations.contains(&"self"));
    assert!(relations.contains(&"first"));
    assert!(relations.contains(&"last"));
    assert!(relations.contains(&"next"));
    assert!(!relations.contains(&"previous"));

    // follow next twice; the final page has 5 entries and no next link
    let next_url = |bundle: &serde_json::Value| -> Option<String> {
        bundle["link"]
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["relation"] == "next")
            .map(|l| {
                let url = l["url"].as_str().unwrap();
                url[url.find("/fhir").unwrap()..].to_string()
            })
    };

    let mut total_entries = page1["entry"].as_array().unwrap().len();
    let (_, _, page2) = send(&app, "GET", &next_url(&page1).unwrap(), None, &[]).await;
    let page2 = page2.unwrap();
    total_entries += page2["entry"].as_array().unwrap().len();
    let (_, _, page3) = send(&app, "GET", &next_url(&page2).unwrap(), None, &[]).await;
    let page3 = page3.unwrap();
    total_entries += page3["entry"].as_array().unwrap().len();

    assert_eq!(page3["entry"].as_array().unwrap().len(), 5);
    assert!(next_url(&page3).is_none());
    assert_eq!(total_entries, 25);
}

#[tokio::test]
async fn search_by_token_and_date() {
    let app = test_app();
    send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;
    let mut other = patient();
    other["gender"] = json!("female");
    other["birthDate"] = json!("1995-06-20");
    send(&app, "POST", "/fhir/r5/Patient", Some(other), &[]).await;

    let (_, _, bundle) = send(&app, "GET", "/fhir/r5/Patient?gender=male", None, &[]).await;
    assert_eq!(bundle.unwrap()["total"], 1);

    // birthdate=eq1980 matches any date within the calendar year
    let (_, _, bundle) = send(&app, "GET", "/fhir/r5/Patient?birthdate=1980", None, &[]).await;
    assert_eq!(bundle.unwrap()["total"], 1);

    let (_, _, bundle) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?birthdate=ge1990-01-01",
        None,
        &[],
    )
    .await;
    assert_eq!(bundle.unwrap()["total"], 1);

    let (_, _, bundle) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?gender=male&family=Smith",
        None,
        &[],
    )
    .await;
    assert_eq!(bundle.unwrap()["total"], 1);
}

#[tokio::test]
async fn search_control_parameter_errors() {
    let app = test_app();

    let (status, _, body) = send(&app, "GET", "/fhir/r5/Patient?_count=0", None, &[]).await;
    assert_eq!(status, 400);
    assert_eq!(body.unwrap()["issue"][0]["code"], "invalid");

    let (status, _, _) = send(&app, "GET", "/fhir/r5/Patient?family:fuzzy=x", None, &[]).await;
    assert_eq!(status, 400);

    let (status, _, _) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?birthdate=ge199X",
        None,
        &[],
    )
    .await;
    assert_eq!(status, 400);

    let (status, _, _) = send(&app, "GET", "/fhir/r5/Patient?_sort=height", None, &[]).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn unknown_parameter_lenient_warns_in_bundle() {
    let app = test_app();
    send(&app, "POST", "/fhir/r5/Patient", Some(patient()), &[]).await;

    let (status, _, bundle) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?favoriteColor=blue",
        None,
        &[],
    )
    .await;
    assert_eq!(status, 200);
    let bundle = bundle.unwrap();
    let first = &bundle["entry"][0];
    assert_eq!(first["search"]["mode"], "outcome");
    assert_eq!(first["resource"]["resourceType"], "OperationOutcome");
    // the match entry follows the outcome entry
    assert_eq!(bundle["entry"][1]["search"]["mode"], "match");
}

#[tokio::test]
async fn metadata_lists_capabilities() {
    let app = test_app();
    let (status, headers, body) = send(&app, "GET", "/fhir/r5/metadata", None, &[]).await;
    assert_eq!(status, 200);
    assert_eq!(headers.get("x-fhir-version").unwrap(), "R5");
    let body = body.unwrap();
    assert_eq!(body["resourceType"], "CapabilityStatement");
    assert_eq!(body["fhirVersion"], "5.0.0");
    let resources = body["rest"][0]["resource"].as_array().unwrap();
    assert!(resources.iter().any(|r| r["type"] == "Patient"));
}

#[tokio::test]
async fn validate_operation_roundtrip() {
    let app = test_app();
    let (status, _, body) = send(
        &app,
        "POST",
        "/fhir/r5/Patient/$validate",
        Some(json!({"resourceType": "Patient"})),
        &[],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body.unwrap()["issue"][0]["severity"], "information");

    let (status, _, body) = send(
        &app,
        "POST",
        "/fhir/r5/Patient/$frobnicate",
        Some(json!({})),
        &[],
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-supported");
}

#[tokio::test]
async fn xml_accept_is_rejected() {
    let app = test_app();
    let (status, _, body) = send(
        &app,
        "GET",
        "/fhir/r5/Patient?family=Smith",
        None,
        &[("accept", "application/fhir+xml")],
    )
    .await;
    assert_eq!(status, 415);
    assert_eq!(body.unwrap()["issue"][0]["code"], "not-supported");
}

#[tokio::test]
async fn body_type_mismatch_is_400() {
    let app = test_app();
    let (status, _, body) = send(
        &app,
        "POST",
        "/fhir/r5/Patient",
        Some(json!({"resourceType": "Observation"})),
        &[],
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body.unwrap()["issue"][0]["code"], "invalid");
}
