//! End-to-end API tests over a real listener.

use chrono::Utc;
use serde_json::{json, Value};
use wisp_licensing::MasterOverride;
use wisp_tests::fixtures::LicenseFixture;
use wisp_tests::helpers::{start_test_server, ApiTestClient, TestHarness};

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new(None);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client.get("/health").await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_current_without_license_is_404() {
    let harness = TestHarness::new(None);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client.get("/api/system-licenses/current").await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_current_returns_summary() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client.get("/api/system-licenses/current").await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["licenseKey"], "WISP-PREM-12345");
    assert_eq!(body["planType"], "premium");
    assert_eq!(body["status"], "active");
    assert_eq!(body["validity"], "valid");
}

#[tokio::test]
async fn test_activate_rejects_empty_key() {
    let harness = TestHarness::new(None);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client
        .post("/api/system-licenses/activate", &json!({ "licenseKey": "  " }))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_activate_with_master_key() {
    let harness = TestHarness::new(None);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let master_key = MasterOverride::new().key().to_string();
    let response = client
        .post(
            "/api/system-licenses/activate",
            &json!({ "licenseKey": master_key }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["planType"], "master");
    assert_eq!(body["limits"]["clientLimit"], -1);
    assert_eq!(body["limits"]["userLimit"], -1);
}

#[tokio::test]
async fn test_activate_registers_with_authority() {
    let harness = TestHarness::new(None);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client
        .post(
            "/api/system-licenses/activate",
            &json!({
                "licenseKey": "WISP-NEW-KEY-001",
                "companyName": "River ISP",
                "email": "ops@river.example",
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["licenseKey"], "WISP-NEW-KEY-001");
    assert_eq!(body["planType"], "premium");
    assert!(harness.repo.snapshot().is_some());
}

#[tokio::test]
async fn test_suspended_license_blocks_creates_with_402() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::suspended(now)));
    harness.clock.set(now);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client
        .post("/api/clients", &json!({ "name": "New client" }))
        .await
        .unwrap();
    assert_eq!(response.status(), 402);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "LICENSE_SUSPENDED");
    assert!(body["message"].as_str().unwrap().contains("Payment overdue"));
    let allowed: Vec<&str> = body["allowedActions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(allowed.contains(&"payments"));
    assert!(allowed.contains(&"read"));
}

#[tokio::test]
async fn test_suspended_license_still_allows_reads_and_payments() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::suspended(now)));
    harness.clock.set(now);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    // Reads pass: only creates are gated.
    let response = client.get("/api/clients").await.unwrap();
    assert_eq!(response.status(), 200);

    // Payment creation is exempt so the customer can settle the bill.
    let response = client
        .post("/api/payments", &json!({ "amount": 199.0 }))
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_verify_master_key_works_offline() {
    let harness = TestHarness::new(None);
    harness.authority.set_offline(true);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let master_key = MasterOverride::new().key().to_string();
    let response = client
        .post(
            "/api/system-licenses/verify",
            &json!({ "licenseKey": master_key }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["offline"], false);
    assert_eq!(body["planType"], "master");
    assert_eq!(body["limits"]["clientLimit"], -1);
}

#[tokio::test]
async fn test_force_validation_runs_heartbeat() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    let (addr, _handle) = start_test_server(harness.app_state()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let response = client
        .post("/licenses/force-validation", &json!({}))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(harness.authority.last_heartbeat().unwrap().forced);
}
