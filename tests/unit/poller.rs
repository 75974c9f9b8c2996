//! Readiness polling under paused time.

#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::bail;
use rds_validator::application::poller::{Poll, PollPolicy, Waiter, await_ready};
use rds_validator::domain::ProvisionError;
use rds_validator::domain::error::is_cancelled;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mocks::SilentReporter;

const INTERVAL: Duration = Duration::from_secs(30);

fn provision_error(e: &anyhow::Error) -> &ProvisionError {
    e.downcast_ref::<ProvisionError>().expect("provision error")
}

#[tokio::test(start_paused = true)]
async fn test_ready_after_n_checks_waits_n_minus_one_intervals() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let calls = &AtomicU32::new(0);
    let started = Instant::now();

    let value = await_ready("db", PollPolicy::every(INTERVAL), &cancel, &reporter, move || async move {
        Ok(if calls.fetch_add(1, Ordering::SeqCst) + 1 >= 4 {
            Poll::Ready("up")
        } else {
            Poll::NotYet
        })
    })
    .await
    .expect("ready");

    assert_eq!(value, "up");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(reporter.ticks.load(Ordering::SeqCst), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= INTERVAL * 3 && elapsed < INTERVAL * 4, "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_ready_immediately_does_not_sleep() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let started = Instant::now();

    await_ready("db", PollPolicy::every(INTERVAL), &cancel, &reporter, move || async move {
        Ok(Poll::Ready(()))
    })
    .await
    .expect("ready");

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(reporter.ticks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_never_checks() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let calls = &AtomicU32::new(0);

    let err = await_ready("keypair", PollPolicy::every(INTERVAL), &cancel, &reporter, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Poll::Ready(()))
    })
    .await
    .expect_err("cancelled");

    assert!(is_cancelled(&err));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_sleep() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let err = await_ready("bastion", PollPolicy::every(INTERVAL), &cancel, &reporter, move || async move {
        Ok(Poll::<()>::NotYet)
    })
    .await
    .expect_err("cancelled");

    assert!(matches!(
        provision_error(&err),
        ProvisionError::Cancelled { waiting_for } if waiting_for == "bastion"
    ));
    assert!(started.elapsed() < INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_waiting_target() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let policy = PollPolicy::every(INTERVAL).with_timeout(Some(Duration::from_secs(60)));

    let err = await_ready("cluster c-1", policy, &cancel, &reporter, move || async move {
        Ok(Poll::<()>::NotYet)
    })
    .await
    .expect_err("timed out");

    match provision_error(&err) {
        ProvisionError::TimedOut { waiting_for, after } => {
            assert_eq!(waiting_for, "cluster c-1");
            assert_eq!(*after, Duration::from_secs(60));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_check_error_is_not_retried() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let calls = &AtomicU32::new(0);

    let err = await_ready("db", PollPolicy::every(INTERVAL), &cancel, &reporter, move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) == 1 {
            bail!("throttled");
        }
        Ok(Poll::<()>::NotYet)
    })
    .await
    .expect_err("fatal");

    assert_eq!(err.to_string(), "throttled");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_waiter_applies_deadline() {
    let reporter = SilentReporter::default();
    let cancel = CancellationToken::new();
    let policy =
        PollPolicy::every(Duration::from_secs(5)).with_timeout(Some(Duration::from_secs(45)));
    let waiter = Waiter::new(policy, &cancel, &reporter);
    let started = Instant::now();

    let err = waiter
        .until("ssh", || async { Ok(Poll::<()>::NotYet) })
        .await
        .expect_err("timed out");

    assert!(matches!(provision_error(&err), ProvisionError::TimedOut { .. }));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(45) && elapsed < Duration::from_secs(50));
}
