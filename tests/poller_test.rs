//! Integration tests for change polling and the run loop.

use std::sync::Arc;
use std::time::Duration;

use sheit_rs::config::Config;
use sheit_rs::event::{Event, EventKind};
use sheit_rs::model::{Row, Status};
use sheit_rs::source::memory::{InMemorySource, Operation};
use sheit_rs::{Error, PollOutcome, Reconciled, Tracker};
use tokio::sync::broadcast;

const STAMP: &str = "2026-10-19T10:00:00.000000Z";

async fn setup() -> (Arc<InMemorySource>, Tracker) {
    let source = Arc::new(InMemorySource::new("Assignments", &["assigned", "hed"]));
    let tracker = Tracker::new(Config::new("sheet-1", "{}"), source.clone());
    tracker.provision_log_sheet().await;
    (source, tracker)
}

fn assignment(assigned: &str, hed: &str) -> Row {
    Row::new().with("assigned", assigned).with("hed", hed)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[Event], name: &str) -> usize {
    events.iter().filter(|e| e.kind.name() == name).count()
}

#[tokio::test]
async fn new_stamp_emits_updated_and_starts_each_assignment() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com ", " Fix bug ")).unwrap();
    source.add_assignment(assignment("b@x.com", "Write docs")).unwrap();
    source.add_assignment(assignment("c@x.com", "  ")).unwrap();
    source.add_assignment(Row::new().with("hed", "Orphan task")).unwrap();
    source.set_updated(Some(STAMP));
    let mut rx = tracker.subscribe();
    let mut poller = tracker.poller();

    let outcome = poller.poll_once().await;
    assert_eq!(outcome.label(), "updated");
    assert_eq!(outcome.dispatched(), 2);
    let results = outcome.settle().await;
    assert!(results.iter().all(|r| matches!(r, Ok(Reconciled::Created(_)))));
    assert_eq!(poller.cursor(), Some(STAMP));

    let events = drain(&mut rx);
    assert_eq!(count(&events, "updated"), 1);
    assert_eq!(count(&events, "started"), 2);
    assert_eq!(events[0].kind.name(), "updated");
    let EventKind::Updated(ref data) = events[0].kind else {
        panic!("expected updated first");
    };
    assert_eq!(data.title, "Assignments");
    assert_eq!(data.updated.as_deref(), Some(STAMP));
    assert_eq!(data.rows.len(), 4);

    let mut logged: Vec<_> = source
        .log_rows()
        .into_iter()
        .map(|r| (r.trimmed("assigned").to_string(), r.trimmed("hed").to_string(), r.status()))
        .collect();
    logged.sort();
    assert_eq!(
        logged,
        vec![
            ("a@x.com".into(), "Fix bug".into(), Some(Status::Started)),
            ("b@x.com".into(), "Write docs".into(), Some(Status::Started)),
        ]
    );
}

#[tokio::test]
async fn trimmed_fields_are_written_to_the_log() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com ", " Fix bug ")).unwrap();
    let mut poller = tracker.poller();

    poller.poll_once().await.settle().await;

    let rows = source.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("assigned"), Some("a@x.com"));
    assert_eq!(rows[0].get("hed"), Some("Fix bug"));
    assert_eq!(rows[0].get("status"), Some("started"));
}

#[tokio::test]
async fn unchanged_stamp_does_nothing() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    source.set_updated(Some(STAMP));
    let mut poller = tracker.poller();
    poller.poll_once().await.settle().await;

    // Log writes bump the workbook stamp; pin it back to model an idle sheet.
    source.set_updated(Some(STAMP));
    source.reset_calls();
    let mut rx = tracker.subscribe();

    let outcome = poller.poll_once().await;

    assert!(matches!(outcome, PollOutcome::Unchanged));
    assert_eq!(outcome.dispatched(), 0);
    assert!(drain(&mut rx).is_empty());
    let calls = source.calls();
    assert_eq!(calls.append_row + calls.save_row, 0);
    assert_eq!(calls.rows, 1, "only the primary sheet is read");
}

#[tokio::test]
async fn missing_stamp_is_treated_as_no_update() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    source.set_updated(None);
    let mut rx = tracker.subscribe();

    let outcome = tracker.poller().poll_once().await;

    assert!(matches!(outcome, PollOutcome::NoData));
    assert!(drain(&mut rx).is_empty());
    assert!(source.log_rows().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_reported_and_polling_continues() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    let mut rx = tracker.subscribe();
    let mut poller = tracker.poller();
    source.fail_next(Operation::Info);

    let outcome = poller.poll_once().await;
    assert!(matches!(outcome, PollOutcome::NoData));
    assert_eq!(poller.cursor(), None);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::Error(Error::Fetch(_))));

    let outcome = poller.poll_once().await;
    assert_eq!(outcome.dispatched(), 1);
    outcome.settle().await;
    assert_eq!(source.log_rows().len(), 1);
}

#[tokio::test]
async fn poll_does_not_reopen_settled_assignments() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    source.add_assignment(assignment("b@x.com", "Write docs")).unwrap();
    let mut poller = tracker.poller();
    poller.poll_once().await.settle().await;

    tracker.complete("a@x.com", "Fix bug").await.unwrap();
    source.set_updated(Some(STAMP));
    let mut rx = tracker.subscribe();

    source.reset_calls();

    let results = poller.poll_once().await.settle().await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| matches!(r, Ok(Reconciled::Unchanged(_)))));
    let rows = source.log_rows();
    assert_eq!(rows.len(), 2);
    let a = rows.iter().find(|r| r.trimmed("assigned") == "a@x.com").unwrap();
    assert_eq!(a.status(), Some(Status::Completed));
    assert_eq!(count(&drain(&mut rx), "started"), 0);
    assert_eq!(source.calls().save_row, 0);
}

#[tokio::test]
async fn idle_sheet_settles_after_own_log_writes() {
    let (source, tracker) = setup().await;
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    let mut poller = tracker.poller();

    // First cycle creates the log row; its write changes the stamp once.
    poller.poll_once().await.settle().await;
    let echo = poller.poll_once().await.settle().await;
    assert!(matches!(echo.as_slice(), [Ok(Reconciled::Unchanged(_))]));

    source.reset_calls();
    let mut rx = tracker.subscribe();
    for _ in 0..5 {
        let outcome = poller.poll_once().await;
        assert!(matches!(outcome, PollOutcome::Unchanged));
    }

    assert!(drain(&mut rx).is_empty());
    let calls = source.calls();
    assert_eq!(calls.save_row, 0);
    assert_eq!(calls.append_row, 0);
    assert_eq!(source.log_rows().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_provisions_polls_and_stops_on_shutdown() {
    let source = Arc::new(InMemorySource::new("Assignments", &["assigned", "hed"]));
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    let config = Config::new("sheet-1", "{}").poll_interval(Duration::from_secs(20));
    let tracker = Tracker::new(config, source.clone());
    let mut rx = tracker.subscribe();

    let handle = tracker.spawn();

    let mut seen = Vec::new();
    while !seen.contains(&"started") {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for events")
            .unwrap();
        seen.push(event.kind.name());
    }
    assert_eq!(seen.first(), Some(&"updated"));
    assert_eq!(source.worksheet_titles(), vec!["Sheet1", "Log"]);
    assert_eq!(source.log_rows().len(), 1);

    tracker.shutdown();
    tokio::time::timeout(Duration::from_secs(60), handle)
        .await
        .expect("run loop did not stop")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn run_loop_accepts_an_unbounded_interval() {
    let source = Arc::new(InMemorySource::new("Assignments", &["assigned", "hed"]));
    source.add_assignment(assignment("a@x.com", "Fix bug")).unwrap();
    let config = Config::new("sheet-1", "{}").poll_interval(Duration::MAX);
    let tracker = Tracker::new(config, source.clone());
    let mut rx = tracker.subscribe();

    let handle = tracker.spawn();
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for the first cycle")
        .unwrap();
    assert_eq!(first.kind.name(), "updated");

    tracker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run loop did not stop")
        .unwrap();
}
