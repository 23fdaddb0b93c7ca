//! End-to-end coordinator tests
//!
//! Drive the full pipeline (event source, matcher, dispatcher, dedup
//! store) with scripted collaborators and a real store in a temp
//! directory, and pin down the dispatch guarantees.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::fixtures::{
    beamform_event, event_for_project, rule_set, science_event, CALIBRATED_RULE, SINGLE_RULE,
    TWO_WILDCARD_RULES,
};
use common::helpers::{
    accepting_queue, channel_source, flaky_queue, no_secrets, open_store, queue_never_called,
    run_events, secrets,
};
use coordinator::services::DedupStore;
use coordinator::{Coordinator, CoordinatorError, Dispatcher, Phase};
use shared::DispatchStatus;
use tempfile::TempDir;

#[tokio::test]
async fn submits_once_per_qualifying_event_and_absorbs_duplicates() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let submissions = Arc::new(Mutex::new(Vec::new()));

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        accepting_queue(&submissions),
        secrets(),
        false,
        // The same event arrives twice, as after a middleware reconnect.
        vec![vec![science_event("SB100")], vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    assert_eq!(submissions.lock().unwrap().len(), 1);
    let record = store.lookup("vast:SB100").unwrap().unwrap();
    assert_eq!(record.status, DispatchStatus::Submitted);
    assert_eq!(record.job_reference.as_deref(), Some("job-1"));
}

#[tokio::test]
async fn at_most_once_holds_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.db");

    {
        let store = DedupStore::open(&path).unwrap();
        let submissions = Arc::new(Mutex::new(Vec::new()));
        run_events(
            rule_set(SINGLE_RULE),
            store,
            accepting_queue(&submissions),
            secrets(),
            false,
            vec![vec![science_event("SB100")]],
        )
        .await
        .unwrap();
        assert_eq!(submissions.lock().unwrap().len(), 1);
        // Every handle dropped here: the process is "gone".
    }

    // Second process lifetime, same store, same event redelivered.
    let store = DedupStore::open(&path).unwrap();
    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        queue_never_called(),
        secrets(),
        false,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    let record = store.lookup("vast:SB100").unwrap().unwrap();
    assert_eq!(record.status, DispatchStatus::Submitted);
}

#[tokio::test]
async fn dry_run_bookkeeps_but_never_touches_the_queue() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        queue_never_called(),
        secrets(),
        true,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    let record = store.lookup("vast:SB100").unwrap().unwrap();
    assert_eq!(record.status, DispatchStatus::DryRun);
    assert!(record.job_reference.is_none());
    assert!(record.submitted_at.is_some());
}

#[tokio::test]
async fn excluded_scans_are_skipped_with_a_record() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        queue_never_called(),
        secrets(),
        false,
        // Delivered twice; the skip is recorded once.
        vec![vec![beamform_event("SB200")], vec![beamform_event("SB200")]],
    )
    .await
    .unwrap();

    let record = store.lookup("vast:SB200").unwrap().unwrap();
    assert_eq!(record.status, DispatchStatus::Skipped);
    assert_eq!(store.records().unwrap().len(), 1);
}

#[tokio::test]
async fn unmatched_events_leave_no_trace() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        queue_never_called(),
        secrets(),
        false,
        vec![vec![event_for_project("SB300", "AS999")]],
    )
    .await
    .unwrap();

    assert!(store.records().unwrap().is_empty());
}

#[tokio::test]
async fn transient_queue_failure_is_contained_and_recorded() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        flaky_queue(),
        secrets(),
        false,
        vec![vec![science_event("SB1")], vec![science_event("SB2")]],
    )
    .await
    .expect("queue outage must not stop the loop");

    let failed = store.lookup("vast:SB1").unwrap().unwrap();
    assert_eq!(failed.status, DispatchStatus::Failed);
    assert!(failed.error_detail.as_deref().unwrap().contains("queue down"));
    assert!(failed.job_reference.is_none());

    let submitted = store.lookup("vast:SB2").unwrap().unwrap();
    assert_eq!(submitted.status, DispatchStatus::Submitted);
}

#[tokio::test]
async fn failed_dispatch_is_retried_on_redelivery() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        flaky_queue(),
        secrets(),
        false,
        // First delivery fails at the queue; the redelivery may retry.
        vec![vec![science_event("SB1")], vec![science_event("SB1")]],
    )
    .await
    .unwrap();

    let record = store.lookup("vast:SB1").unwrap().unwrap();
    assert_eq!(record.status, DispatchStatus::Submitted);
    assert_eq!(record.job_reference.as_deref(), Some("job-2"));
    assert!(record.error_detail.is_none());
}

#[tokio::test]
async fn missing_secret_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());

    let err = run_events(
        rule_set(SINGLE_RULE),
        store.clone(),
        queue_never_called(),
        no_secrets(),
        false,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CoordinatorError::Config { .. }));
    // Startup validation failed before any event was consumed.
    assert!(store.records().unwrap().is_empty());
}

#[tokio::test]
async fn submitted_job_carries_live_coordinates_and_secret() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let submissions = Arc::new(Mutex::new(Vec::new()));

    run_events(
        rule_set(SINGLE_RULE),
        store,
        accepting_queue(&submissions),
        secrets(),
        false,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    let specs = submissions.lock().unwrap();
    assert_eq!(specs.len(), 1);
    let spec = &specs[0];

    // The rule configures ra/dec 0.0; the event's live pointing wins.
    assert_eq!(spec.params["ra"], 10.5);
    assert_eq!(spec.params["dec"], -30.0);
    assert_eq!(spec.params["ttype"], "triggerobs");
    assert_eq!(spec.project_id, "T001");
    assert_eq!(spec.secure_key, "s3cret");
    assert_eq!(spec.obsname, "vast");
}

#[tokio::test]
async fn one_event_fans_out_to_every_matching_alias() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let submissions = Arc::new(Mutex::new(Vec::new()));

    run_events(
        rule_set(TWO_WILDCARD_RULES),
        store.clone(),
        accepting_queue(&submissions),
        secrets(),
        false,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    assert_eq!(submissions.lock().unwrap().len(), 2);
    assert_eq!(
        store.lookup("vast:SB100").unwrap().unwrap().status,
        DispatchStatus::Submitted
    );
    assert_eq!(
        store.lookup("gw:SB100").unwrap().unwrap().status,
        DispatchStatus::Submitted
    );
}

#[tokio::test]
async fn calibration_follow_up_is_dispatched_and_deduplicated_separately() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let submissions = Arc::new(Mutex::new(Vec::new()));

    run_events(
        rule_set(CALIBRATED_RULE),
        store.clone(),
        accepting_queue(&submissions),
        secrets(),
        false,
        vec![vec![science_event("SB100")]],
    )
    .await
    .unwrap();

    let specs = submissions.lock().unwrap();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].obsname, "vast");
    assert_eq!(specs[1].obsname, "vast_cal");
    assert_eq!(specs[1].params["calibrator"], true);
    assert_eq!(specs[1].params["calexptime"], 120);

    assert_eq!(
        store.lookup("vast:SB100").unwrap().unwrap().status,
        DispatchStatus::Submitted
    );
    assert_eq!(
        store.lookup("vast:SB100:cal").unwrap().unwrap().status,
        DispatchStatus::Submitted
    );
}

#[tokio::test]
async fn stop_signal_drains_and_terminates() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let submissions = Arc::new(Mutex::new(Vec::new()));

    let (tx, source) = channel_source();
    let dispatcher = Dispatcher::new(
        store.clone(),
        accepting_queue(&submissions),
        secrets(),
        false,
    );
    let mut coordinator = Coordinator::new(rule_set(SINGLE_RULE), source, dispatcher);
    coordinator.initialize().await.unwrap();

    let shutdown = coordinator.get_shutdown_sender();
    let runner = tokio::spawn(async move {
        let result = coordinator.run().await;
        result.map(|_| coordinator)
    });

    tx.send(vec![science_event("SB100")]).await.unwrap();

    // Wait for the batch to land before signalling, then stop.
    for _ in 0..200 {
        if store.lookup("vast:SB100").unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.send(()).await.unwrap();

    let coordinator = runner.await.unwrap().expect("clean shutdown");
    assert_eq!(coordinator.state().phase(), Phase::Terminated);
    assert_eq!(coordinator.state().events_seen, 1);
    assert_eq!(submissions.lock().unwrap().len(), 1);
}
