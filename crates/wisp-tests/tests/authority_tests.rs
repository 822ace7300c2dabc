//! HTTP authority client tests against mock endpoints.

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wisp_core::authority::{HardwareInfo, HeartbeatPayload, InstallationContact, UsageCounts};
use wisp_core::license::PlanType;
use wisp_core::ports::AuthorityApi;
use wisp_licensing::{HttpAuthorityClient, LicensingConfig};

fn config_for(primary: &str, fallback: Option<&str>) -> LicensingConfig {
    LicensingConfig {
        primary_url: primary.to_string(),
        fallback_url: fallback.map(|s| s.to_string()),
        request_timeout_secs: 5,
        ..LicensingConfig::default()
    }
}

fn test_hardware() -> HardwareInfo {
    HardwareInfo {
        hostname: "test-host".to_string(),
        platform: "linux".to_string(),
        arch: "x86_64".to_string(),
        cpu_model: "Test CPU".to_string(),
        mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
    }
}

fn test_payload() -> HeartbeatPayload {
    HeartbeatPayload {
        license_key: "WISP-TEST-KEY".to_string(),
        hardware_id: "hw-fingerprint".to_string(),
        hardware: test_hardware(),
        location: Some(InstallationContact::default()),
        metrics: UsageCounts {
            clients: 10,
            users: 2,
            plugins: 1,
        },
        limits_validation: vec![],
        date_manipulation: None,
        timestamp: Utc::now(),
        forced: false,
    }
}

#[tokio::test]
async fn test_validate_parses_authority_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "status": "active",
            "planType": "premium",
            "expiresAt": "2027-01-01T00:00:00Z",
            "features": { "ticketing": true },
            "limits": { "clientLimit": 2000, "userLimit": 15, "pluginLimit": 25 },
            "suspended": false
        })))
        .mount(&server)
        .await;

    let client = HttpAuthorityClient::new(&config_for(&server.uri(), None)).unwrap();
    let outcome = client
        .validate("WISP-TEST-KEY", "hw-fingerprint", &test_hardware())
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(!outcome.offline);
    assert_eq!(outcome.plan_type, Some(PlanType::Premium));
    assert_eq!(outcome.limits.unwrap().client_limit, 2000);
    assert_eq!(outcome.features.get("ticketing"), Some(&true));
}

#[tokio::test]
async fn test_gateway_error_falls_back_to_secondary() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/licenses/validate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .and(path("/licenses/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "planType": "basic"
        })))
        .expect(1)
        .mount(&fallback)
        .await;

    let client =
        HttpAuthorityClient::new(&config_for(&primary.uri(), Some(&fallback.uri()))).unwrap();
    let outcome = client
        .validate("WISP-TEST-KEY", "hw-fingerprint", &test_hardware())
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(!outcome.offline);
    assert_eq!(outcome.plan_type, Some(PlanType::Basic));
}

#[tokio::test]
async fn test_explicit_rejection_never_retries_fallback() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/licenses/validate"))
        .respond_with(ResponseTemplate::new(422).set_body_string("License key revoked"))
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .and(path("/licenses/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .expect(0)
        .mount(&fallback)
        .await;

    let client =
        HttpAuthorityClient::new(&config_for(&primary.uri(), Some(&fallback.uri()))).unwrap();
    let outcome = client
        .validate("WISP-TEST-KEY", "hw-fingerprint", &test_hardware())
        .await
        .unwrap();

    assert!(!outcome.valid);
    assert!(!outcome.offline);
    assert!(outcome.error.unwrap().contains("revoked"));
}

#[tokio::test]
async fn test_all_endpoints_down_validates_offline() {
    // Nothing listens on these ports.
    let config = config_for("http://127.0.0.1:9", Some("http://127.0.0.1:10"));
    let client = HttpAuthorityClient::new(&config).unwrap();

    let outcome = client
        .validate("WISP-TEST-KEY", "hw-fingerprint", &test_hardware())
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(outcome.offline);
}

#[tokio::test]
async fn test_validate_handles_multibyte_license_keys() {
    let config = config_for("http://127.0.0.1:9", None);
    let client = HttpAuthorityClient::new(&config).unwrap();

    // Opaque keys are not guaranteed ASCII; a key whose 8th byte falls
    // inside a multibyte character must not break the validation path.
    let outcome = client
        .validate("abcdefg\u{e9}x", "hw-fingerprint", &test_hardware())
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(outcome.offline);
}

#[tokio::test]
async fn test_heartbeat_offline_when_unreachable() {
    let config = config_for("http://127.0.0.1:9", None);
    let client = HttpAuthorityClient::new(&config).unwrap();

    let outcome = client.heartbeat(&test_payload()).await.unwrap();
    assert!(outcome.offline);
    assert!(!outcome.success);
    assert!(!outcome.suspended);
}

#[tokio::test]
async fn test_heartbeat_parses_suspension_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/heartbeat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "suspended": true, "suspensionReason": "Payment overdue" }
        })))
        .mount(&server)
        .await;

    let client = HttpAuthorityClient::new(&config_for(&server.uri(), None)).unwrap();
    let outcome = client.heartbeat(&test_payload()).await.unwrap();

    assert!(outcome.success);
    assert!(outcome.suspended);
    assert_eq!(outcome.suspension_reason.as_deref(), Some("Payment overdue"));
}

#[tokio::test]
async fn test_register_rejection_surfaces_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/register"))
        .respond_with(ResponseTemplate::new(409).set_body_string("Key already registered"))
        .mount(&server)
        .await;

    let client = HttpAuthorityClient::new(&config_for(&server.uri(), None)).unwrap();
    let outcome = client
        .register(
            "WISP-TEST-KEY",
            "hw-fingerprint",
            &test_hardware(),
            &InstallationContact::default(),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("already registered"));
}

#[tokio::test]
async fn test_pending_commands_parsing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/licenses/WISP-TEST-KEY/pending-commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "commands": [
                { "id": "cmd-1", "command": "block", "parameters": { "reason": "Abuse" } },
                { "id": "cmd-2", "command": "message", "parameters": { "message": "Hello" } }
            ]
        })))
        .mount(&server)
        .await;

    let client = HttpAuthorityClient::new(&config_for(&server.uri(), None)).unwrap();
    let commands = client.pending_commands("WISP-TEST-KEY").await.unwrap();

    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].id, "cmd-1");
    assert_eq!(commands[0].command, "block");
    assert_eq!(commands[0].parameters["reason"], "Abuse");
}
