//! Ledger ordering properties.

#![allow(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{Result, bail};
use proptest::prelude::*;
use rds_validator::application::ledger::{Ledger, Recorded, Releaser};
use rds_validator::domain::ResourceHandle;

/// Records release order; fails for the pids in `failing`.
#[derive(Default)]
struct OrderReleaser {
    order: Mutex<Vec<u32>>,
    failing: HashSet<u32>,
}

impl Releaser for OrderReleaser {
    async fn release(&self, handle: &ResourceHandle) -> Result<()> {
        let ResourceHandle::ExternalProcess { pid, .. } = handle else {
            bail!("unexpected handle {handle}");
        };
        self.order.lock().expect("mutex poisoned").push(*pid);
        if self.failing.contains(pid) {
            bail!("cannot stop {pid}");
        }
        Ok(())
    }
}

fn process(pid: u32) -> ResourceHandle {
    ResourceHandle::ExternalProcess {
        pid,
        label: format!("tunnel {pid}"),
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    /// Whatever was recorded comes back in exactly reverse order.
    #[test]
    fn prop_unwind_is_reverse_of_record(count in 0u32..40) {
        let (order, released) = block_on(async {
            let ledger = Ledger::new(OrderReleaser::default());
            for pid in 0..count {
                assert_eq!(ledger.record(process(pid)).await, Recorded::Tracked);
            }
            let report = ledger.unwind().await;
            (ledger_order(&ledger), report.released.len())
        });
        let expected: Vec<u32> = (0..count).rev().collect();
        prop_assert_eq!(order, expected);
        prop_assert_eq!(released, count as usize);
    }

    /// Failures never stop the unwind; every handle is attempted once.
    #[test]
    fn prop_failures_do_not_stop_unwind(
        count in 1u32..30,
        failing in proptest::collection::hash_set(0u32..30, 0..10),
    ) {
        let failing_recorded = failing.iter().filter(|pid| **pid < count).count();
        let (order, report) = block_on(async {
            let ledger = Ledger::new(OrderReleaser {
                failing: failing.clone(),
                ..OrderReleaser::default()
            });
            for pid in 0..count {
                ledger.record(process(pid)).await;
            }
            let report = ledger.unwind().await;
            (ledger_order(&ledger), report)
        });
        prop_assert_eq!(order.len(), count as usize);
        prop_assert_eq!(report.failed.len(), failing_recorded);
        prop_assert_eq!(report.released.len() + report.failed.len(), count as usize);
        prop_assert_eq!(report.is_complete(), failing_recorded == 0);
    }
}

fn ledger_order(ledger: &Ledger<OrderReleaser>) -> Vec<u32> {
    ledger.releaser().order.lock().expect("mutex poisoned").clone()
}

#[tokio::test]
async fn test_unwind_of_empty_ledger_is_complete() {
    let ledger = Ledger::new(OrderReleaser::default());
    let report = ledger.unwind().await;
    assert!(report.is_complete());
    assert!(report.released.is_empty());
}

#[tokio::test]
async fn test_concurrent_unwinds_release_once() {
    let ledger = Ledger::new(OrderReleaser::default());
    for pid in 0..5 {
        ledger.record(process(pid)).await;
    }
    let (a, b) = tokio::join!(ledger.unwind(), ledger.unwind());
    assert_eq!(a, b);
    assert_eq!(ledger_order(&ledger), vec![4, 3, 2, 1, 0]);
}

#[tokio::test]
async fn test_entries_keep_record_order() {
    let ledger = Ledger::new(OrderReleaser::default());
    ledger.record(process(1)).await;
    ledger.record(process(2)).await;
    assert_eq!(ledger.entries().await, vec![process(1), process(2)]);
    assert_eq!(ledger.len().await, 2);
}
