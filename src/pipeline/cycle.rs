// src/pipeline/cycle.rs

//! One poll cycle: login, navigate, extract, diff, persist, notify.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{AppError, CycleError, CycleStage, Result};
use crate::logging::LogContext;
use crate::models::{ChangeEvent, Credentials, PortalConfig, Snapshot};
use crate::notify::{Notification, NotificationSink};
use crate::pipeline::diff::{ChangeDetector, DiffResult};
use crate::services::{LinkMatcher, RecordExtractor, SessionNavigator};
use crate::storage::SnapshotStore;
use crate::utils::http::SessionFactory;

/// The pure part of a cycle: portal to diff, no side effects on the snapshot.
pub struct PollCycle {
    navigator: SessionNavigator,
    steps: Vec<LinkMatcher>,
    extractor: RecordExtractor,
    detector: ChangeDetector,
}

impl PollCycle {
    pub fn new(portal: &PortalConfig, sessions: Arc<dyn SessionFactory>) -> Result<Self> {
        Ok(Self {
            steps: portal.link_matchers()?,
            extractor: RecordExtractor::new(&portal.results_table_selector)?,
            navigator: SessionNavigator::new(sessions, portal.clone()),
            detector: ChangeDetector::new(),
        })
    }

    /// Run navigator, extractor, and detector once against `previous`.
    pub async fn run_once(
        &self,
        ctx: &LogContext,
        credentials: &Credentials,
        previous: &Snapshot,
    ) -> std::result::Result<DiffResult, CycleError> {
        let session = self
            .navigator
            .authenticate(ctx, credentials)
            .await
            .map_err(|e| CycleError::new(CycleStage::Authenticate, e))?;

        let page = self
            .navigator
            .follow_path(ctx, session, &self.steps)
            .await
            .map_err(|e| CycleError::new(CycleStage::Navigate, e))?;

        let records = self
            .extractor
            .extract(ctx, &page)
            .map_err(|e| CycleError::new(CycleStage::Extract, e))?;

        Ok(self.detector.diff(ctx, previous, &records))
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    /// First observation; nothing was notified
    pub baseline: bool,
    /// Records in the persisted snapshot
    pub tracked: usize,
    pub events: Vec<ChangeEvent>,
    pub delivered: usize,
    pub failed_deliveries: usize,
    pub elapsed_ms: i64,
}

/// Orchestrates cycles against a snapshot store and a notification sink.
///
/// Cycles are serialised: concurrent calls to [`Poller::poll`] wait for
/// the running cycle to finish.
pub struct Poller {
    cycle: PollCycle,
    credentials: Credentials,
    store: Arc<dyn SnapshotStore>,
    sink: Arc<dyn NotificationSink>,
    counter: Mutex<u64>,
}

impl Poller {
    pub fn new(
        cycle: PollCycle,
        credentials: Credentials,
        store: Arc<dyn SnapshotStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cycle,
            credentials,
            store,
            sink,
            counter: Mutex::new(0),
        }
    }

    /// Run one full cycle. On error the snapshot is untouched and nothing is sent.
    pub async fn poll(&self) -> std::result::Result<CycleReport, CycleError> {
        let mut counter = self.counter.lock().await;
        *counter += 1;
        let ctx = LogContext::new(*counter);
        ctx.info("Start crawling");

        let result = self.poll_with(&ctx).await;
        if let Err(e) = &result {
            ctx.error(&e.to_string());
        }
        result
    }

    async fn poll_with(&self, ctx: &LogContext) -> std::result::Result<CycleReport, CycleError> {
        let previous = self
            .store
            .load_all()
            .await
            .map_err(persist_error)?;
        ctx.debug(&format!("Loaded snapshot with {} record(s)", previous.len()));

        let diff = self.cycle.run_once(ctx, &self.credentials, &previous).await?;

        self.persist(ctx, &diff).await.map_err(persist_error)?;

        let (delivered, failed_deliveries) = self.notify(ctx, &diff.events).await;
        let (new, changed) = (diff.new_count(), diff.changed_count());

        let report = CycleReport {
            cycle: ctx.cycle(),
            baseline: diff.baseline,
            tracked: diff.next.len(),
            delivered,
            failed_deliveries,
            elapsed_ms: ctx.elapsed_ms(),
            events: diff.events,
        };

        ctx.summary(
            "Finished crawl",
            &[
                ("Tracked", report.tracked.to_string()),
                ("New", new.to_string()),
                ("Changed", changed.to_string()),
                ("Notified", format!("{}/{}", report.delivered, report.events.len())),
                ("Duration", format!("{} ms", report.elapsed_ms)),
            ],
        );
        Ok(report)
    }

    async fn persist(&self, ctx: &LogContext, diff: &DiffResult) -> Result<()> {
        if diff.baseline {
            let records: Vec<_> = diff.next.records().cloned().collect();
            ctx.info(&format!("Insert very first grades: {} record(s)", records.len()));
            return self.store.insert_many(&records).await;
        }

        if diff.events.is_empty() {
            return Ok(());
        }
        let records: Vec<_> = diff.events.iter().map(|e| e.current().clone()).collect();
        self.store.update_many(&records).await
    }

    /// Deliver one notification per event, in order. Failures are logged and skipped.
    async fn notify(&self, ctx: &LogContext, events: &[ChangeEvent]) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for event in events {
            let notification = Notification::from_event(event);
            ctx.info(&format!("New grade! {}", notification.summary()));
            match self.sink.deliver(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    ctx.warn(&format!(
                        "Notification via {} failed for {}: {}",
                        self.sink.name(),
                        notification.id,
                        e
                    ));
                }
            }
        }
        (delivered, failed)
    }
}

/// Tag a store failure with the persist stage, keeping existing persistence errors as they are.
fn persist_error(e: AppError) -> CycleError {
    let cause = match e {
        AppError::Persistence(_) => e,
        other => AppError::persistence(other),
    };
    CycleError::new(CycleStage::Persist, cause)
}
