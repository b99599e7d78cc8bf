//! Turns raw page-mutation signals into debounced processing passes.
//!
//! Each signal pushes the single debounce deadline back; a pass only starts
//! once the page has been quiet for the whole interval. Passes run as
//! separate tasks and may overlap a slow predecessor still waiting on the
//! store. The driver itself takes no locks; ordering of the resulting writes
//! is the write queue's job.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::page::PageSource;
use crate::tracker::{PassReport, Tracker};

/// Single-owner debounce deadline with explicit cancel and reschedule.
pub struct DebounceTimer {
    delay: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Replace any pending deadline with one `delay` from now.
    pub fn reschedule(&mut self) {
        self.deadline = Some(Box::pin(tokio::time::sleep(self.delay)));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes when the pending deadline passes, and never while idle.
    /// Dropping this future leaves the deadline in place.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// Sending half handed to whatever observes the page.
#[derive(Clone)]
pub struct MutationNotifier {
    tx: mpsc::UnboundedSender<()>,
}

impl MutationNotifier {
    /// Returns false once the driver has stopped.
    pub fn notify(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

pub fn mutation_channel() -> (MutationNotifier, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MutationNotifier { tx }, rx)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub signals: usize,
    pub passes: usize,
    pub reconciliations: usize,
}

pub struct ObservationDriver<S: PageSource> {
    tracker: Arc<Tracker>,
    source: Arc<S>,
    timer: DebounceTimer,
    current_chat: Option<String>,
    reports: Option<mpsc::UnboundedSender<PassReport>>,
    summary: DriverSummary,
}

impl<S: PageSource> ObservationDriver<S> {
    pub fn new(tracker: Arc<Tracker>, source: Arc<S>, debounce: Duration) -> Self {
        Self {
            tracker,
            source,
            timer: DebounceTimer::new(debounce),
            current_chat: None,
            reports: None,
            summary: DriverSummary::default(),
        }
    }

    /// Forward every finished pass report to `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<PassReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Observe until every [`MutationNotifier`] is dropped.
    ///
    /// Start-up reconciles the current chat and processes the page once
    /// without waiting for a signal. On shutdown a pending deadline is
    /// cancelled and its pass run at once, then in-flight passes are awaited.
    pub async fn run(mut self, mut signals: mpsc::UnboundedReceiver<()>) -> DriverSummary {
        info!("Observation driver starting");
        // Subscribe before loading so no change falls between the two
        let settings_watcher = self.tracker.watch_settings();
        if let Err(e) = self.tracker.load_settings().await {
            warn!("Could not load settings, using defaults: {}", e);
        }

        let mut passes: JoinSet<PassReport> = JoinSet::new();
        self.start_pass(&mut passes);

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(()) => {
                        self.summary.signals += 1;
                        self.timer.reschedule();
                    }
                    None => break,
                },
                () = self.timer.fired() => self.start_pass(&mut passes),
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    self.finish_pass(joined);
                }
            }
        }

        // No further signals can arrive, so a pending pass need not wait
        if self.timer.is_pending() {
            self.timer.cancel();
            self.start_pass(&mut passes);
        }
        while let Some(joined) = passes.join_next().await {
            self.finish_pass(joined);
        }
        settings_watcher.abort();

        info!(
            "Observation driver stopped after {} signals, {} passes",
            self.summary.signals, self.summary.passes
        );
        self.summary
    }

    fn start_pass(&mut self, passes: &mut JoinSet<PassReport>) {
        let Some(page) = self.source.snapshot() else {
            debug!("No page loaded, skipping pass");
            return;
        };

        let chat_id = page.chat_id();
        let navigated = self.current_chat.as_deref() != Some(chat_id.as_str());
        if navigated {
            debug!("Now observing chat {}", chat_id);
            self.current_chat = Some(chat_id.clone());
            self.summary.reconciliations += 1;
        }
        self.summary.passes += 1;

        let tracker = self.tracker.clone();
        passes.spawn(async move {
            if navigated {
                if let Err(e) = tracker.reconcile(&chat_id, &page.url).await {
                    warn!("Reconciling chat {} failed: {}", chat_id, e);
                }
            }
            tracker.process_page(&page).await
        });
    }

    fn finish_pass(&mut self, joined: Result<PassReport, tokio::task::JoinError>) {
        match joined {
            Ok(report) => {
                if let Some(tx) = &self.reports {
                    let _ = tx.send(report);
                }
            }
            Err(e) => warn!("Processing pass aborted: {}", e),
        }
    }
}
