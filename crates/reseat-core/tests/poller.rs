mod support;

use std::time::Duration;

use tokio::time::Instant;

use reseat_core::directory::DeviceDirectory;
use reseat_core::poll::{PollOutcome, PollSettings, wait_until_absent};

use support::{FakeDirectory, NEVER};

fn settings() -> PollSettings {
    PollSettings::new(Duration::from_secs(60), Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn confirms_immediately_when_record_is_absent() {
    let directory = FakeDirectory::new();
    let started = Instant::now();

    let outcome = wait_until_absent(&directory, "ABC123", &settings())
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Confirmed);
    assert_eq!(directory.find_calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn confirms_once_deletion_propagates() {
    let directory = FakeDirectory::new()
        .with_device("ABC123", Some("Line-01"))
        .with_propagation_delay("ABC123", 2);
    let record = directory.find("ABC123").await.unwrap().unwrap();
    directory.delete(&record).await.unwrap();

    let started = Instant::now();
    let outcome = wait_until_absent(&directory, "ABC123", &settings())
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Confirmed);
    // Two lookups saw the lingering record, the third saw it gone.
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn times_out_when_record_never_disappears() {
    let directory = FakeDirectory::new().with_device("ABC123", None);
    let started = Instant::now();

    let outcome = wait_until_absent(&directory, "ABC123", &settings())
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::TimedOut);
    // Attempts at t = 0, 10, ..., 60: at least six polls before giving up,
    // and the elapsed wait lands on the timeout within one interval.
    assert!(directory.find_calls() >= 6, "got {}", directory.find_calls());
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() <= Duration::from_secs(70));
}

#[tokio::test(start_paused = true)]
async fn times_out_even_with_unobservable_deletion() {
    let directory = FakeDirectory::new()
        .with_device("ABC123", None)
        .with_propagation_delay("ABC123", NEVER);
    let record = directory.find("ABC123").await.unwrap().unwrap();
    directory.delete(&record).await.unwrap();

    let outcome = wait_until_absent(&directory, "ABC123", &settings())
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn lookup_errors_propagate() {
    let directory = FakeDirectory::new()
        .with_device("ABC123", None)
        .with_find_error("ABC123", support::remote_error(503, "throttled"));

    let result = wait_until_absent(&directory, "ABC123", &settings()).await;
    assert!(result.is_err());
}
