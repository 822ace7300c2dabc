//! Remote command channel: execution, acknowledgment, idempotence.

use chrono::Utc;
use serde_json::json;
use wisp_core::license::{PlanLimits, PlanType};
use wisp_tests::fixtures::LicenseFixture;
use wisp_tests::helpers::TestHarness;

#[tokio::test]
async fn test_block_command_suspends_and_acknowledges() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness
        .authority
        .push_command("cmd-1", "block", json!({ "reason": "Abuse report" }));

    let processed = harness.commands.poll_once().await.unwrap();
    assert_eq!(processed, 1);

    let record = harness.repo.snapshot().unwrap();
    assert!(record.is_suspended());
    assert_eq!(
        record.metadata.suspension_reason.as_deref(),
        Some("Abuse report")
    );

    let acks = harness.authority.acks.lock().unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, "cmd-1");
    assert!(acks[0].1.success);
}

#[tokio::test]
async fn test_redelivered_block_is_idempotent_but_still_acked() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness
        .authority
        .push_command("cmd-1", "block", json!({ "reason": "First delivery" }));
    harness
        .authority
        .push_command("cmd-1", "block", json!({ "reason": "Second delivery" }));

    let processed = harness.commands.poll_once().await.unwrap();
    assert_eq!(processed, 2);

    // Only the first delivery changed state.
    let record = harness.repo.snapshot().unwrap();
    assert_eq!(
        record.metadata.suspension_reason.as_deref(),
        Some("First delivery")
    );

    // Both deliveries were acknowledged successfully.
    let acks = harness.authority.acks.lock().unwrap();
    assert_eq!(acks.len(), 2);
    assert!(acks.iter().all(|(id, result)| id == "cmd-1" && result.success));
    assert_eq!(acks[1].1.response.as_deref(), Some("already suspended"));
}

#[tokio::test]
async fn test_unblock_command_reactivates() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::suspended(now)));
    harness.clock.set(now);
    harness.authority.push_command("cmd-2", "unblock", json!({}));

    harness.commands.poll_once().await.unwrap();

    let record = harness.repo.snapshot().unwrap();
    assert!(!record.is_suspended());
    assert!(record.metadata.suspension_reason.is_none());
}

#[tokio::test]
async fn test_unblock_on_active_license_is_noop() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness.authority.push_command("cmd-3", "unblock", json!({}));

    harness.commands.poll_once().await.unwrap();

    let acks = harness.authority.acks.lock().unwrap();
    assert!(acks[0].1.success);
    assert_eq!(acks[0].1.response.as_deref(), Some("already active"));
}

#[tokio::test]
async fn test_heartbeat_command_triggers_forced_heartbeat() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness.authority.push_command("cmd-4", "heartbeat", json!({}));

    harness.commands.poll_once().await.unwrap();

    let payload = harness.authority.last_heartbeat().unwrap();
    assert!(payload.forced);
}

#[tokio::test]
async fn test_unknown_and_unimplemented_commands_ack_unsupported() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness.authority.push_command("cmd-5", "restart", json!({}));
    harness
        .authority
        .push_command("cmd-6", "self_destruct", json!({}));

    let processed = harness.commands.poll_once().await.unwrap();
    assert_eq!(processed, 2);

    let acks = harness.authority.acks.lock().unwrap();
    assert!(!acks[0].1.success);
    assert!(acks[0].1.error.as_deref().unwrap().contains("restart"));
    assert!(!acks[1].1.success);
    assert!(acks[1].1.error.as_deref().unwrap().contains("self_destruct"));
}

#[tokio::test]
async fn test_message_command_is_delivered() {
    let now = Utc::now();
    let harness = TestHarness::new(Some(LicenseFixture::premium(now)));
    harness.clock.set(now);
    harness
        .authority
        .push_command("cmd-7", "message", json!({ "message": "Maintenance window tonight" }));

    harness.commands.poll_once().await.unwrap();

    let acks = harness.authority.acks.lock().unwrap();
    assert!(acks[0].1.success);
}

#[tokio::test]
async fn test_poll_without_license_is_noop() {
    let harness = TestHarness::new(None);
    assert_eq!(harness.commands.poll_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_master_plan_never_polls() {
    let now = Utc::now();
    let mut record = LicenseFixture::premium(now);
    record.plan_type = PlanType::Master;
    record.limits = PlanLimits::unlimited();

    let harness = TestHarness::new(Some(record));
    harness.clock.set(now);
    harness.authority.push_command("cmd-8", "block", json!({}));

    assert_eq!(harness.commands.poll_once().await.unwrap(), 0);
    // The queued command was never fetched.
    assert_eq!(harness.authority.pending.lock().unwrap().len(), 1);
}
