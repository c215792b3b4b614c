//! Self-healing publisher over any [`Connector`].

use sensorwatch_transport::{Connector, Publisher, TransportError};
use sensorwatch_types::ConnectionState;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backoff::Backoff;

/// Wraps a connector and keeps a link open, reconnecting with exponential
/// backoff whenever connecting or publishing fails.
///
/// State moves through `Disconnected -> Connecting -> Connected`, and into
/// `BackingOff { delay }` after any failure. Every transition is sent on a
/// watch channel so observers always see the latest state.
pub struct ResilientPublisher<C: Connector> {
    connector: C,
    link: Option<C::Link>,
    backoff: Backoff,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> ResilientPublisher<C> {
    pub fn new(connector: C, backoff: Backoff) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            link: None,
            backoff,
            state,
        }
    }

    /// Observe connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Wait until a link is open. Retries forever.
    pub async fn ensure_connected(&mut self) {
        while self.link.is_none() {
            self.transition(ConnectionState::Connecting);
            match self.connector.connect().await {
                Ok(link) => {
                    self.link = Some(link);
                    self.backoff.reset();
                    self.transition(ConnectionState::Connected);
                    info!(
                        event = "connected",
                        endpoint = %self.connector.describe(),
                        "Transport link established"
                    );
                }
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        event = "connect_failed",
                        endpoint = %self.connector.describe(),
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "Connect failed, backing off"
                    );
                    self.back_off(delay).await;
                }
            }
        }
    }

    /// Publish one payload on the current link.
    ///
    /// Connects first if needed. On failure the link is dropped, the
    /// publisher waits out the next backoff delay and the payload is
    /// discarded; the error is returned so the caller can log it.
    pub async fn publish(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.ensure_connected().await;

        let result = match self.link.as_mut() {
            Some(link) => link.publish(payload).await,
            None => Err(TransportError::Connection("no open link".to_string())),
        };

        if let Err(err) = &result {
            self.link = None;
            let delay = self.backoff.next_delay();
            warn!(
                event = "link_lost",
                endpoint = %self.connector.describe(),
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "Publish failed, dropping link"
            );
            self.back_off(delay).await;
        }
        result
    }

    async fn back_off(&mut self, delay: std::time::Duration) {
        self.transition(ConnectionState::BackingOff { delay });
        tokio::time::sleep(delay).await;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorwatch_transport::MemoryQueue;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fourth_attempt_waits_for_cumulative_backoff() {
        let queue = MemoryQueue::new("sensor.readings");
        queue.fail_next_connects(3);
        let mut publisher = ResilientPublisher::new(queue.connector(), Backoff::default());

        let start = Instant::now();
        publisher.ensure_connected().await;

        let attempts = queue.connect_attempts();
        assert_eq!(attempts.len(), 4);
        assert!(attempts[3] - start >= Duration::from_millis(7000));
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1000));
        assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2000));
        assert_eq!(attempts[3] - attempts[2], Duration::from_millis(4000));
        assert_eq!(publisher.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_link_loss() {
        let queue = MemoryQueue::new("sensor.readings");
        queue.fail_next_connects(2);
        let mut publisher = ResilientPublisher::new(queue.connector(), Backoff::default());
        publisher.ensure_connected().await;

        queue.set_online(false);
        assert!(publisher.publish(b"lost").await.is_err());
        queue.set_online(true);

        let before = queue.connect_attempts().len();
        publisher.publish(b"kept").await.unwrap();
        assert_eq!(queue.connect_attempts().len(), before + 1);
        assert_eq!(queue.published(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn state_changes_are_observable() {
        let queue = MemoryQueue::new("sensor.readings");
        queue.fail_next_connects(1);
        let mut publisher = ResilientPublisher::new(queue.connector(), Backoff::default());
        let mut rx = publisher.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);

        let task = tokio::spawn(async move {
            publisher.ensure_connected().await;
            publisher
        });

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            seen.push(state);
            if state.is_connected() {
                break;
            }
        }
        let publisher = task.await.unwrap();

        assert!(seen.contains(&ConnectionState::BackingOff {
            delay: Duration::from_millis(1000)
        }));
        assert_eq!(seen.last(), Some(&ConnectionState::Connected));
        assert!(publisher.is_connected());
    }
}
