// src/pipeline/schedule.rs

//! Fixed-interval scheduling of poll cycles.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::pipeline::Poller;

/// Counters for a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub cycles: u64,
    pub failures: u64,
    pub notifications: u64,
}

/// Poll immediately, then every `interval`, until `shutdown` resolves.
///
/// A running cycle is never interrupted; shutdown is honoured between
/// cycles. Failed cycles are logged and the next tick starts from scratch.
pub async fn run_scheduled<F>(poller: &Poller, interval: Duration, shutdown: F) -> ScheduleStats
where
    F: Future<Output = ()>,
{
    let mut stats = ScheduleStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    log::info!("Polling every {} minute(s)", interval.as_secs() / 60);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Shutdown requested; scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                stats.cycles += 1;
                match poller.poll().await {
                    Ok(report) => stats.notifications += report.delivered as u64,
                    Err(e) => {
                        stats.failures += 1;
                        log::warn!("Cycle failed, retrying at next interval: {}", e);
                    }
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Config, Credentials};
    use crate::pipeline::PollCycle;
    use crate::pipeline::testing::{ENTRY_URL, FakePortal, PASSWORD, RecordingSink, results_page};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn poller(portal: FakePortal, storage: LocalStorage, password: &str) -> Poller {
        let mut config = Config::default();
        config.portal.entry_url = ENTRY_URL.to_string();
        let cycle = PollCycle::new(&config.portal, Arc::new(portal)).unwrap();
        Poller::new(
            cycle,
            Credentials::new("ab12cdef", password),
            Arc::new(storage),
            Arc::new(RecordingSink::default()),
        )
    }

    #[tokio::test]
    async fn test_first_tick_runs_immediately() {
        let tmp = TempDir::new().unwrap();
        let portal = FakePortal::new(&results_page(&[("A", "Algo", "1,0", "5")]));
        let poller = poller(portal, LocalStorage::new(tmp.path()), PASSWORD);

        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        let stats = run_scheduled(&poller, Duration::from_secs(3600), shutdown).await;

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_stop_scheduler() {
        let tmp = TempDir::new().unwrap();
        let portal = FakePortal::new(&results_page(&[]));
        let poller = poller(portal, LocalStorage::new(tmp.path()), "wrong");

        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        let stats = run_scheduled(&poller, Duration::from_secs(3600), shutdown).await;

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.failures, 1);
    }
}
