//! The client aggregator against a real query server and live feed.

use std::sync::Arc;
use std::time::Duration;

use sensorwatch::{AggregatorView, Client, ClientConfig, DedupPolicy, HistoryStatus};
use sensorwatch_ingest::{hub, query, FanoutHub, IngestService, MemoryStore};
use sensorwatch_types::DeviceId;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct Backend {
    service: IngestService<MemoryStore>,
    query_addr: String,
    feed_addr: String,
}

async fn backend() -> Backend {
    let store = Arc::new(MemoryStore::new());
    let hub = FanoutHub::new("readings", 64);

    let query_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let query_addr = format!("http://{}", query_listener.local_addr().unwrap());
    tokio::spawn(query::serve_query(query_listener, store.clone()));

    let feed_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let feed_addr = feed_listener.local_addr().unwrap().to_string();
    tokio::spawn(hub::serve_feed(feed_listener, hub.clone()));

    Backend {
        service: IngestService::new(store, hub),
        query_addr,
        feed_addr,
    }
}

fn reading(device: i64, temperature: f64) -> Vec<u8> {
    format!(
        r#"{{"fechaGeneración":"2024-12-21T10:15:00Z","IdDispositivo":{device},"temperatura":{temperature},"humedad":50}}"#
    )
    .into_bytes()
}

async fn wait_for(
    view: &mut watch::Receiver<Arc<AggregatorView>>,
    predicate: impl Fn(&AggregatorView) -> bool,
) -> Arc<AggregatorView> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let current = view.borrow_and_update().clone();
            if predicate(&current) {
                return current;
            }
            view.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test]
async fn snapshot_then_live_samples() {
    let backend = backend().await;
    for t in [20.0, 21.0, 22.0] {
        assert!(backend.service.handle(&reading(1, t)).await.unwrap().is_accepted());
    }

    let client = Client::start(ClientConfig {
        history_url: backend.query_addr.clone(),
        live_addr: backend.feed_addr.clone(),
        ..Default::default()
    })
    .unwrap();
    let mut view = client.view();

    let loaded = wait_for(&mut view, |v| {
        v.status.history == HistoryStatus::Loaded(3) && v.status.live_ok()
    })
    .await;
    let temps: Vec<Option<f64>> = loaded.series[&DeviceId::from(1)].temperatures();
    assert_eq!(temps, vec![Some(20.0), Some(21.0), Some(22.0)]);

    backend.service.handle(&reading(2, 30.0)).await.unwrap();
    let live = wait_for(&mut view, |v| v.series.contains_key(&DeviceId::from(2))).await;
    assert_eq!(live.aggregates.sample_count, 4);
    assert_eq!(live.aggregates.mean_temperature, Some(23.25));
    assert!(live.recency.is_some());
}

#[tokio::test]
async fn history_failure_leaves_live_running() {
    let backend = backend().await;

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);

    let client = Client::start(ClientConfig {
        history_url: dead_url,
        live_addr: backend.feed_addr.clone(),
        dedup: DedupPolicy::ById,
        ..Default::default()
    })
    .unwrap();
    let mut view = client.view();

    let failed = wait_for(&mut view, |v| {
        v.status.history == HistoryStatus::Failed && v.status.live_ok()
    })
    .await;
    assert!(failed.status.last_error.is_some());

    backend.service.handle(&reading(5, 25.5)).await.unwrap();
    let live = wait_for(&mut view, |v| !v.series.is_empty()).await;
    assert_eq!(
        live.series[&DeviceId::from(5)].latest().unwrap().temperature,
        Some(25.5)
    );
}

#[tokio::test]
async fn live_feed_reconnects_after_server_appears() {
    let placeholder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = placeholder.local_addr().unwrap();
    drop(placeholder);

    let client = Client::start(ClientConfig {
        live_addr: addr.to_string(),
        reconnect_delay: Duration::from_millis(50),
        ..Default::default()
    })
    .unwrap();
    let mut view = client.view();
    wait_for(&mut view, |v| v.status.last_error.is_some()).await;

    let hub = FanoutHub::new("readings", 8);
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(hub::serve_feed(listener, hub));

    wait_for(&mut view, |v| v.status.live_ok()).await;
}
