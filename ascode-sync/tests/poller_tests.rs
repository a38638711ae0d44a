mod common;

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ascode_core::{Operation, OperationStatus, RepositoryStrategy, Secret};
use ascode_sync::{poll_repository_operation, PollerConfig, SyncError};

use common::ScriptedAnalyzer;

fn config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_secs(2),
        timeout: Duration::from_secs(10),
    }
}

fn operation() -> Operation {
    Operation {
        vcs_server: "github".to_string(),
        repo_full_name: "acme/api".to_string(),
        repository_strategy: RepositoryStrategy {
            connection_type: "https".to_string(),
            user: "bot".to_string(),
            password: Secret::new("hunter2"),
            ssh_key_content: Secret::new("PRIVATE-KEY"),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn assert_elapsed(start: Instant, secs: u64) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs) + Duration::from_millis(100),
        "elapsed {elapsed:?}, expected about {secs}s"
    );
}

#[tokio::test(start_paused = true)]
async fn completes_on_done_after_each_interval() {
    let analyzer = ScriptedAnalyzer::new(&[
        OperationStatus::Processing,
        OperationStatus::Processing,
        OperationStatus::Done,
    ])
    .with_files(&[(".cds/w.yml", "name: w")]);
    let mut op = operation();
    let start = Instant::now();

    poll_repository_operation(&analyzer, &mut op, &config(), &CancellationToken::new())
        .await
        .expect("done");

    assert_eq!(analyzer.fetches(), 3);
    assert_elapsed(start, 6);
    assert_eq!(op.status, OperationStatus::Done);
    assert_eq!(op.load_files.results.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn operation_error_is_redacted() {
    let mut analyzer = ScriptedAnalyzer::new(&[OperationStatus::Error]);
    analyzer.error = "clone failed: authentication required".to_string();
    let mut op = operation();

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_operation_failure());
    let shown = err.to_string();
    assert!(shown.contains("clone failed: authentication required"));
    assert!(shown.contains("acme/api"));
    assert!(!shown.contains("hunter2"));
    assert!(!shown.contains("PRIVATE-KEY"));
    // The operation itself keeps its credentials.
    assert_eq!(op.repository_strategy.password.expose(), "hunter2");
}

#[tokio::test(start_paused = true)]
async fn times_out_and_stops_fetching() {
    let analyzer = ScriptedAnalyzer::new(&[OperationStatus::Processing]);
    let mut op = operation();
    let start = Instant::now();

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(!err.is_cancelled());
    assert_elapsed(start, 10);
    assert_eq!(analyzer.fetches(), 4);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(analyzer.fetches(), 4);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_polling() {
    let analyzer = ScriptedAnalyzer::new(&[OperationStatus::Processing]);
    let mut op = operation();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_timeout());
    assert_eq!(analyzer.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_never_fetches() {
    let analyzer = ScriptedAnalyzer::new(&[OperationStatus::Done]);
    let mut op = operation();
    let token = CancellationToken::new();
    token.cancel();

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(analyzer.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn fetch_error_is_returned_immediately() {
    let mut analyzer = ScriptedAnalyzer::new(&[OperationStatus::Processing]);
    analyzer.fail_fetch = true;
    let mut op = operation();

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Remote(_)));
    assert!(err.to_string().contains("analysis service unavailable"));
    assert_eq!(analyzer.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_slow_fetch() {
    let mut analyzer = ScriptedAnalyzer::new(&[OperationStatus::Done]);
    analyzer.fetch_delay = Some(Duration::from_secs(60));
    let mut op = operation();
    let start = Instant::now();

    let err = poll_repository_operation(&analyzer, &mut op, &config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_elapsed(start, 10);
    assert_eq!(analyzer.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_polls_without_panicking() {
    let analyzer = ScriptedAnalyzer::new(&[OperationStatus::Processing, OperationStatus::Done]);
    let mut op = operation();
    let config = PollerConfig {
        interval: Duration::ZERO,
        timeout: Duration::from_secs(10),
    };

    poll_repository_operation(&analyzer, &mut op, &config, &CancellationToken::new())
        .await
        .expect("done");

    assert_eq!(analyzer.fetches(), 2);
}
