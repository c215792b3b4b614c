//! Live feed subscriber.
//!
//! Connects to the fan-out hub's TCP feed, subscribes to a topic and turns
//! every received line into an [`Update::Live`]. On any drop or error it
//! waits a fixed delay and reconnects, reporting each state change.

use std::time::Duration;

use sensorwatch_types::ConnectionState;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::Update;
use crate::data::normalize_message;
use crate::error::ClientError;

/// Reconnecting subscriber for one live feed topic.
#[derive(Debug, Clone)]
pub struct LiveSubscriber {
    addr: String,
    topic: String,
    reconnect_delay: Duration,
}

impl LiveSubscriber {
    pub fn new(addr: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            topic: topic.into(),
            reconnect_delay: Duration::from_secs(3),
        }
    }

    /// Fixed wait between a drop and the next attempt. Defaults to 3s.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn spawn(self, updates: mpsc::Sender<Update>) -> JoinHandle<()> {
        tokio::spawn(self.run(updates))
    }

    /// Subscribe forever, until the aggregator goes away.
    pub async fn run(self, updates: mpsc::Sender<Update>) {
        loop {
            if !send(&updates, Update::LiveState(ConnectionState::Connecting)).await {
                return;
            }

            let outcome = match self.open().await {
                Ok(reader) => {
                    info!(event = "live_connected", addr = %self.addr, topic = %self.topic, "Live feed connected");
                    if !send(&updates, Update::LiveState(ConnectionState::Connected)).await {
                        return;
                    }
                    read_feed(reader, &updates).await
                }
                Err(e) => Err(e),
            };

            let reason = match outcome {
                Ok(()) => return, // aggregator gone
                Err(e) => e.to_string(),
            };
            warn!(
                event = "live_disconnected",
                addr = %self.addr,
                error = %reason,
                retry_in_ms = self.reconnect_delay.as_millis() as u64,
                "Live feed lost"
            );
            if !send(&updates, Update::LiveError(reason)).await
                || !send(
                    &updates,
                    Update::LiveState(ConnectionState::BackingOff {
                        delay: self.reconnect_delay,
                    }),
                )
                .await
            {
                return;
            }
            tokio::time::sleep(self.reconnect_delay).await;
            if !send(&updates, Update::LiveState(ConnectionState::Disconnected)).await {
                return;
            }
        }
    }

    async fn open(&self) -> Result<BufReader<TcpStream>, ClientError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream
            .write_all(format!("SUBSCRIBE {}\n", self.topic).as_bytes())
            .await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }
        match line.trim() {
            ack if ack.starts_with("OK") => Ok(reader),
            other => Err(ClientError::Refused(other.to_string())),
        }
    }
}

/// Pump newline-delimited JSON from `reader` into the aggregator.
///
/// Returns `Ok(())` only when the aggregator has shut down; end of stream is
/// reported as [`ClientError::Closed`]. Lines that are not JSON are skipped.
pub async fn read_feed<R>(mut reader: R, updates: &mpsc::Sender<Update>) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Closed);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(message) => {
                let samples = normalize_message(&message);
                if samples.is_empty() {
                    continue;
                }
                if updates.send(Update::Live(samples)).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => debug!(error = %e, line = trimmed, "Ignoring unparseable live message"),
        }
    }
}

async fn send(updates: &mpsc::Sender<Update>, update: Update) -> bool {
    updates.send(update).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reads_objects_and_arrays_skipping_noise() {
        let data = concat!(
            "{\"deviceId\":1,\"temperature\":20.5}\n",
            "not json\n",
            "\n",
            "[{\"deviceId\":2,\"humidity\":40},{\"humidity\":1}]\n",
            "{\"temperature\":3}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let result = read_feed(BufReader::new(Cursor::new(data)), &tx).await;
        assert!(matches!(result, Err(ClientError::Closed)));

        let Some(Update::Live(first)) = rx.recv().await else {
            panic!("expected live update");
        };
        assert_eq!(first[0].device_id.as_str(), "1");
        let Some(Update::Live(second)) = rx.recv().await else {
            panic!("expected live update");
        };
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].humidity, Some(40.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refused_topic_backs_off_and_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut stream = BufReader::new(stream);
                let mut line = String::new();
                let _ = stream.read_line(&mut line).await;
                let _ = stream.get_mut().write_all(b"ERR unknown topic\n").await;
            }
        });

        let (tx, mut rx) = mpsc::channel(16);
        let task = LiveSubscriber::new(addr.to_string(), "nope")
            .reconnect_delay(Duration::from_millis(20))
            .spawn(tx);

        let mut states = Vec::new();
        let mut errors = Vec::new();
        while states.len() < 5 {
            match rx.recv().await {
                Some(Update::LiveState(state)) => states.push(state),
                Some(Update::LiveError(e)) => errors.push(e),
                other => panic!("unexpected update {other:?}"),
            }
        }
        task.abort();

        assert_eq!(states[0], ConnectionState::Connecting);
        assert_eq!(
            states[1],
            ConnectionState::BackingOff {
                delay: Duration::from_millis(20)
            }
        );
        assert_eq!(states[2], ConnectionState::Disconnected);
        assert_eq!(states[3], ConnectionState::Connecting);
        assert!(errors[0].contains("unknown topic"));
    }
}
