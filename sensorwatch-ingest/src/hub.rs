//! Fan-out hub: best-effort live delivery of normalized samples.
//!
//! The hub is an in-process broadcast channel for one named topic. The feed
//! server exposes it over TCP as newline-delimited JSON:
//!
//! ```text
//! client: SUBSCRIBE readings\n
//! server: OK readings\n
//! server: {"id":1,"generatedAt":...}\n
//! server: {"id":2,"generatedAt":...}\n
//! ```
//!
//! An unknown topic is answered with `ERR unknown topic` and the connection
//! is closed. There is no acknowledgement and no replay: a subscriber that
//! is not connected, or falls too far behind, misses samples.

use std::net::SocketAddr;
use std::sync::Arc;

use sensorwatch_types::NormalizedSample;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// In-process publish/subscribe for one topic.
///
/// Cloning yields another handle to the same hub.
#[derive(Debug, Clone)]
pub struct FanoutHub {
    topic: Arc<str>,
    sender: broadcast::Sender<Arc<NormalizedSample>>,
}

impl FanoutHub {
    /// `capacity` bounds how far a subscriber may lag before it starts
    /// losing samples.
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: Arc::from(topic.into()),
            sender,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Push a sample to every current subscriber.
    ///
    /// Returns how many subscribers it was handed to; zero is not an error.
    pub fn publish(&self, sample: NormalizedSample) -> usize {
        self.sender.send(Arc::new(sample)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<NormalizedSample>> {
        self.sender.subscribe()
    }
}

/// Serve the hub as a TCP live feed until the listener fails.
pub async fn serve_feed(listener: TcpListener, hub: FanoutHub) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, topic = hub.topic(), "Live feed listening");
    }
    loop {
        let (stream, peer) = listener.accept().await?;
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_subscriber(stream, peer, hub).await {
                debug!(peer = %peer, error = %e, "Live feed connection ended");
            }
        });
    }
}

async fn handle_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    hub: FanoutHub,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let Some(request) = lines.next_line().await? else {
        return Ok(());
    };
    let requested = request.trim().strip_prefix("SUBSCRIBE ").map(str::trim);
    if requested != Some(hub.topic()) {
        warn!(peer = %peer, request = %request.trim(), "Rejected live feed subscription");
        write_half.write_all(b"ERR unknown topic\n").await?;
        return write_half.shutdown().await;
    }

    // Subscribe before acknowledging so nothing published after the ack
    // can be missed.
    let mut receiver = hub.subscribe();
    write_half
        .write_all(format!("OK {}\n", hub.topic()).as_bytes())
        .await?;
    info!(peer = %peer, topic = hub.topic(), "Live subscriber attached");

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Ok(sample) => {
                    let mut line = serde_json::to_vec(&*sample)?;
                    line.push(b'\n');
                    write_half.write_all(&line).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(peer = %peer, skipped, "Live subscriber lagged, samples dropped");
                }
                Err(RecvError::Closed) => break,
            },
            // Any further input (or EOF) from the client ends the session.
            next = lines.next_line() => match next? {
                None => break,
                Some(_) => continue,
            },
        }
    }

    info!(peer = %peer, "Live subscriber detached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sensorwatch_types::DeviceId;

    fn sample(id: u64) -> NormalizedSample {
        NormalizedSample {
            id,
            generated_at: Utc::now(),
            device_id: DeviceId::from(1),
            temperature: 20.0,
            humidity: 40.0,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let hub = FanoutHub::new("readings", 8);
        assert_eq!(hub.publish(sample(1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives() {
        let hub = FanoutHub::new("readings", 8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.publish(sample(7)), 2);
        assert_eq!(a.recv().await.unwrap().id, 7);
        assert_eq!(b.recv().await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_samples() {
        let hub = FanoutHub::new("readings", 8);
        hub.publish(sample(1));
        let mut late = hub.subscribe();
        hub.publish(sample(2));
        assert_eq!(late.recv().await.unwrap().id, 2);
    }

    async fn connect(addr: SocketAddr, request: &str) -> BufReader<TcpStream> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        BufReader::new(stream)
    }

    #[tokio::test]
    async fn feed_streams_json_lines() {
        let hub = FanoutHub::new("readings", 8);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_feed(listener, hub.clone()));

        let mut reader = connect(addr, "SUBSCRIBE readings\n").await;
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "OK readings\n");

        hub.publish(sample(3));
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["deviceId"], "1");
    }

    #[tokio::test]
    async fn unknown_topic_is_refused() {
        let hub = FanoutHub::new("readings", 8);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_feed(listener, hub));

        let mut reader = connect(addr, "SUBSCRIBE other\n").await;
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "ERR unknown topic\n");
        line.clear();
        assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
    }
}
