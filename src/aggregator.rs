//! The client aggregator.
//!
//! Historical snapshots, live messages, connectivity changes and the
//! one-second tick all arrive as [`Update`] messages on one channel. A
//! single task owns the state, applies each update in turn and publishes an
//! immutable [`AggregatorView`] through a watch channel, so readers always
//! see a consistent whole and never wait on network I/O.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sensorwatch_types::{ConnectionState, DeviceId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::data::{Aggregates, ClientSample, DeviceSeries, Recency};

/// Whether a sample already in a series may be appended again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Append everything; a sample delivered by both the snapshot and the
    /// live feed appears twice.
    #[default]
    Disabled,
    /// Skip a sample whose id is already present in its device's series.
    ById,
}

/// State of the one-shot historical fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HistoryStatus {
    #[default]
    Pending,
    Loaded(usize),
    Failed,
}

/// Connectivity flags and the last error, always present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    /// Store/query channel.
    pub history: HistoryStatus,
    /// Live feed channel.
    pub live: ConnectionState,
    pub last_error: Option<String>,
}

impl Status {
    pub fn history_ok(&self) -> bool {
        matches!(self.history, HistoryStatus::Loaded(_))
    }

    pub fn live_ok(&self) -> bool {
        self.live.is_connected()
    }
}

/// Everything a renderer needs, as one immutable value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatorView {
    pub series: BTreeMap<DeviceId, DeviceSeries>,
    pub aggregates: Aggregates,
    pub recency: Option<Recency>,
    pub status: Status,
}

/// One input to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Result of the historical fetch, oldest first.
    Snapshot(Vec<ClientSample>),
    HistoryFailed(String),
    /// Samples from one live message.
    Live(Vec<ClientSample>),
    LiveState(ConnectionState),
    LiveError(String),
    /// Periodic clock tick; refreshes recency only.
    Tick,
}

/// The aggregator's mutable state. Owned by exactly one writer.
#[derive(Debug, Default)]
pub struct AggregatorState {
    view: AggregatorView,
    dedup: DedupPolicy,
}

impl AggregatorState {
    pub fn new(dedup: DedupPolicy) -> Self {
        Self {
            view: AggregatorView::default(),
            dedup,
        }
    }

    pub fn view(&self) -> &AggregatorView {
        &self.view
    }

    /// Apply one update as of `now`.
    pub fn apply(&mut self, update: Update, now: DateTime<Utc>) {
        match update {
            Update::Snapshot(samples) => {
                self.view.status.history = HistoryStatus::Loaded(samples.len());
                self.append(samples);
            }
            Update::HistoryFailed(error) => {
                self.view.status.history = HistoryStatus::Failed;
                self.view.status.last_error = Some(error);
            }
            Update::Live(samples) => self.append(samples),
            Update::LiveState(state) => self.view.status.live = state,
            Update::LiveError(error) => self.view.status.last_error = Some(error),
            Update::Tick => {}
        }
        self.view.recency = self.view.aggregates.recency(now);
    }

    fn append(&mut self, samples: Vec<ClientSample>) {
        for sample in samples {
            let series = self.view.series.entry(sample.device_id.clone()).or_default();
            if self.dedup == DedupPolicy::ById {
                if let Some(id) = sample.id.filter(|id| series.contains_id(*id)) {
                    debug!(id, device_id = %sample.device_id, "Skipping duplicate sample");
                    continue;
                }
            }
            series.push(sample);
        }
        self.view.aggregates = Aggregates::compute(&self.view.series);
    }
}

/// Handle to a running aggregator task.
///
/// # Example
///
/// ```rust
/// use sensorwatch::{Aggregator, DedupPolicy, Update};
///
/// # tokio_test::block_on(async {
/// let aggregator = Aggregator::builder().dedup(DedupPolicy::ById).spawn();
/// let mut view = aggregator.view();
///
/// aggregator.updates().send(Update::HistoryFailed("offline".into())).await.unwrap();
/// view.changed().await.unwrap();
/// assert!(!view.borrow().status.history_ok());
/// # });
/// ```
#[derive(Debug)]
pub struct Aggregator {
    updates: mpsc::Sender<Update>,
    view: watch::Receiver<Arc<AggregatorView>>,
    writer: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl Aggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    /// Sender for feeding updates into the aggregator.
    pub fn updates(&self) -> mpsc::Sender<Update> {
        self.updates.clone()
    }

    /// The latest published view.
    pub fn view(&self) -> watch::Receiver<Arc<AggregatorView>> {
        self.view.clone()
    }

    pub fn snapshot(&self) -> Arc<AggregatorView> {
        self.view.borrow().clone()
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.ticker.abort();
        self.writer.abort();
    }
}

/// Builder for configuring an [`Aggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorBuilder {
    dedup: DedupPolicy,
    tick: Duration,
    buffer: usize,
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::Disabled,
            tick: Duration::from_secs(1),
            buffer: 256,
        }
    }
}

impl AggregatorBuilder {
    pub fn dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// Interval of the recency refresh tick. Defaults to 1 second.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Spawn the writer and tick tasks.
    pub fn spawn(self) -> Aggregator {
        let (updates, mut inbox) = mpsc::channel(self.buffer.max(1));
        let (publish, view) = watch::channel(Arc::new(AggregatorView::default()));
        let mut state = AggregatorState::new(self.dedup);

        let writer = tokio::spawn(async move {
            while let Some(update) = inbox.recv().await {
                state.apply(update, Utc::now());
                publish.send_replace(Arc::new(state.view().clone()));
            }
        });

        let tick_tx = updates.clone();
        let period = self.tick;
        let ticker = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if tick_tx.send(Update::Tick).await.is_err() {
                    break;
                }
            }
        });

        Aggregator {
            updates,
            view,
            writer,
            ticker,
        }
    }
}
