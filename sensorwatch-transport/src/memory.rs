//! In-memory transport.
//!
//! A single destination backed by a FIFO queue. The broker can be taken
//! offline to exercise reconnect logic: while offline, connects and
//! publishes on existing links fail.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::delivery::{Acknowledger, Delivery};
use crate::{Connector, Publisher, Subscription, TransportError};

#[derive(Debug)]
struct Queued {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct Inner {
    destination: String,
    messages: Mutex<VecDeque<Queued>>,
    notify: Notify,
    online: AtomicBool,
    closed: AtomicBool,
    /// Number of upcoming connects that fail even while online.
    failing_connects: AtomicU32,
    connect_attempts: Mutex<Vec<Instant>>,
    published: AtomicU64,
}

/// An in-process queue for one destination.
///
/// Cloning yields another handle to the same queue.
///
/// # Example
///
/// ```rust
/// use sensorwatch_transport::{Connector, MemoryQueue};
///
/// # tokio_test::block_on(async {
/// let queue = MemoryQueue::new("sensor.readings");
/// queue.set_online(false);
/// assert!(queue.connector().connect().await.is_err());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    /// Create an empty, online queue.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                destination: destination.into(),
                messages: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                online: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                failing_connects: AtomicU32::new(0),
                connect_attempts: Mutex::new(Vec::new()),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// A connector that opens publishing links to this queue.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            inner: self.inner.clone(),
        }
    }

    /// Attach a consumer.
    pub fn subscribe(&self) -> MemorySubscription {
        MemorySubscription {
            inner: self.inner.clone(),
        }
    }

    /// Bring the broker up or down.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Stop accepting consumers' waits; subscriptions return `None` once drained.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Enqueue a payload directly, bypassing connection state.
    pub fn push(&self, payload: impl Into<Vec<u8>>) {
        self.inner.enqueue(payload.into());
    }

    /// Number of messages waiting for a consumer.
    pub fn len(&self) -> usize {
        self.inner.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total messages accepted through publishing links.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::SeqCst)
    }

    /// Instants at which connection attempts were made.
    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.inner.connect_attempts.lock().clone()
    }
}

impl Inner {
    fn enqueue(&self, payload: Vec<u8>) {
        self.messages.lock().push_back(Queued {
            payload,
            redelivered: false,
        });
        self.notify.notify_one();
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Connector for a [`MemoryQueue`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    inner: Arc<Inner>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Link = MemoryLink;

    async fn connect(&self) -> Result<MemoryLink, TransportError> {
        self.inner.connect_attempts.lock().push(Instant::now());

        let forced_failure = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if forced_failure || !self.inner.is_online() {
            return Err(TransportError::Connection(format!(
                "memory broker for '{}' is offline",
                self.inner.destination
            )));
        }

        Ok(MemoryLink {
            inner: self.inner.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.inner.destination)
    }
}

/// An open publishing link to a [`MemoryQueue`].
#[derive(Debug)]
pub struct MemoryLink {
    inner: Arc<Inner>,
}

#[async_trait]
impl Publisher for MemoryLink {
    async fn publish(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.inner.is_online() {
            return Err(TransportError::Connection("link dropped".to_string()));
        }
        self.inner.enqueue(payload.to_vec());
        self.inner.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A consumer attached to a [`MemoryQueue`].
#[derive(Debug)]
pub struct MemorySubscription {
    inner: Arc<Inner>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, TransportError> {
        loop {
            let notified = self.inner.notify.notified();

            if let Some(queued) = self.inner.messages.lock().pop_front() {
                let ack = Acknowledger::Memory(MemoryAck {
                    inner: self.inner.clone(),
                });
                return Ok(Some(Delivery::new(queued.payload, queued.redelivered, ack)));
            }

            if self.inner.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }

            notified.await;
        }
    }
}

/// Settlement handle for in-memory deliveries.
#[derive(Debug)]
pub(crate) struct MemoryAck {
    inner: Arc<Inner>,
}

impl MemoryAck {
    /// Put the message back at the head of the queue.
    pub(crate) fn requeue(self, payload: Vec<u8>) {
        self.inner.messages.lock().push_front(Queued {
            payload,
            redelivered: true,
        });
        self.inner.notify.notify_one();
    }
}
