mod common;

use common::TestApp;
use gaswatch::alerting::CycleOutcome;
use gaswatch::db::RecipientStore;
use gaswatch::notify::format_gas_alert;
use gaswatch::registration::RegistrationRequest;
use pretty_assertions::assert_eq;

fn request(username: &str, threshold: i64) -> RegistrationRequest {
    RegistrationRequest {
        telegram_username: Some(username.to_string()),
        max_gas_price: Some(threshold),
    }
}

fn completed(outcome: CycleOutcome) -> gaswatch::alerting::CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn register_update_and_alert_bob() {
    let app = TestApp::new();

    let created = app.registration.register(&request("bob_chain", 50)).await.unwrap();
    assert_eq!(created.status, "created");

    let updated = app.registration.register(&request("@Bob_Chain", 30)).await.unwrap();
    assert_eq!(updated.status, "updated");
    assert_eq!(updated.max_gas_price, 30);
    assert_eq!(app.recipients.snapshot().len(), 1);

    app.recipients.attach_chat("bob_chain", 4242).await.unwrap();

    // 40 Gwei is above Bob's limit
    app.oracle.set(Some(40));
    let report = completed(app.scheduler.run_cycle().await.unwrap());
    assert_eq!(report.eligible, 0);
    assert!(app.records.snapshot().is_empty());

    // 25 Gwei is within it
    app.oracle.set(Some(25));
    let report = completed(app.scheduler.run_cycle().await.unwrap());
    assert_eq!(report.delivered, 1);

    let records = app.records.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].gas_price, 25);
    assert!(records[0].success);
    assert_eq!(app.sink.sent(), vec![(4242, format_gas_alert(25, 30))]);

    // Still cooling down on the next tick
    let report = completed(app.scheduler.run_cycle().await.unwrap());
    assert_eq!(report.cooling_down, 1);
    assert_eq!(app.records.snapshot().len(), 1);
}

#[tokio::test]
async fn failed_delivery_is_retried_next_cycle() {
    let app = TestApp::new();
    app.registration.register(&request("bob_chain", 30)).await.unwrap();
    app.recipients.attach_chat("bob_chain", 4242).await.unwrap();
    app.oracle.set(Some(25));

    app.sink.set_accept(false);
    let report = completed(app.scheduler.run_cycle().await.unwrap());
    assert_eq!(report.failed, 1);

    app.sink.set_accept(true);
    let report = completed(app.scheduler.run_cycle().await.unwrap());
    assert_eq!(report.delivered, 1);

    let successes: Vec<bool> = app.records.snapshot().iter().map(|r| r.success).collect();
    assert_eq!(successes, vec![false, true]);

    let stats = app.stats.current_stats().await.unwrap();
    assert_eq!(stats.total_alerts_24h, 2);
    assert_eq!(stats.successful_alerts_24h, 1);
    assert_eq!(stats.active_users, 1);
}

#[tokio::test]
async fn oracle_outage_sends_nothing() {
    let app = TestApp::new();
    app.registration.register(&request("bob_chain", 30)).await.unwrap();
    app.recipients.attach_chat("bob_chain", 4242).await.unwrap();
    app.oracle.set(None);

    assert_eq!(app.scheduler.run_cycle().await.unwrap(), CycleOutcome::NoPrice);
    assert!(app.sink.sent().is_empty());
    assert!(app.records.snapshot().is_empty());
}

#[tokio::test]
async fn stopped_recipient_is_not_alerted() {
    let app = TestApp::new();
    app.registration.register(&request("bob_chain", 30)).await.unwrap();
    app.recipients.attach_chat("bob_chain", 4242).await.unwrap();
    app.recipients.deactivate_by_chat_id(4242).await.unwrap();
    app.oracle.set(Some(10));

    let report = completed(app.scheduler.run_cycle().await.unwrap());

    assert_eq!(report.eligible, 0);
    assert!(app.sink.sent().is_empty());
    assert_eq!(app.stats.current_stats().await.unwrap().active_users, 0);
}
