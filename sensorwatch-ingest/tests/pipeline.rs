//! End-to-end: generator -> in-memory transport -> ingestion -> store + hub.

use std::sync::Arc;
use std::time::Duration;

use hyper::Method;
use sensorwatch_generator::GeneratorBuilder;
use sensorwatch_ingest::{hub, query, FanoutHub, IngestService, MemoryStore, SampleStore};
use sensorwatch_transport::MemoryQueue;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

fn pipeline() -> (MemoryQueue, Arc<MemoryStore>, FanoutHub, IngestService<MemoryStore>) {
    let queue = MemoryQueue::new("sensor.readings");
    let store = Arc::new(MemoryStore::new());
    let hub = FanoutHub::new("readings", 64);
    let service = IngestService::new(store.clone(), hub.clone())
        .with_retry_delay(Duration::from_millis(10));
    (queue, store, hub, service)
}

#[tokio::test]
async fn generated_samples_are_stored_in_order() {
    let (queue, store, _hub, service) = pipeline();

    let mut generator = GeneratorBuilder::new()
        .device_id(4)
        .seed(99)
        .build(queue.connector());
    let mut sent = Vec::new();
    for _ in 0..5 {
        sent.push(generator.tick().await.unwrap());
    }
    queue.close();

    service.run(queue.subscribe()).await.unwrap();

    let mut stored = store.recent(None, 50).await.unwrap();
    stored.reverse();
    assert_eq!(stored.len(), 5);
    for (raw, normalized) in sent.iter().zip(&stored) {
        assert_eq!(Some(normalized.temperature), raw.temperature);
        assert_eq!(Some(normalized.humidity), raw.humidity);
        assert_eq!(normalized.device_id.as_str(), "4");
    }
    let ids: Vec<u64> = stored.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn malformed_and_invalid_messages_do_not_stop_ingestion() {
    let (queue, store, hub, service) = pipeline();
    let mut live = hub.subscribe();

    queue.push(r#"{"IdDispositivo": 1, "temperatura": 2"#);
    queue.push(r#"{"fechaGeneración":"2024-12-21T10:15:00Z","IdDispositivo":1,"temperatura":150,"humedad":40}"#);
    queue.push(r#"{"fechaGeneración":"2024-12-21T10:15:00Z","IdDispositivo":null,"temperatura":20,"humedad":40}"#);
    queue.push("[]");
    queue.push(r#"{"fechaGeneración":"21/12/2024 10:15:00","deviceId":"lab-1","temperature":20.5,"humidity":40}"#);
    queue.close();

    service.run(queue.subscribe()).await.unwrap();

    assert!(queue.is_empty());
    assert_eq!(store.len(), 1);
    let only = live.recv().await.unwrap();
    assert_eq!(only.device_id.as_str(), "lab-1");
    assert!(live.try_recv().is_err());
}

#[tokio::test]
async fn store_outage_is_redelivered_not_dropped() {
    let (queue, store, _hub, service) = pipeline();
    queue.push(r#"{"fechaGeneración":"2024-12-21T10:15:00Z","IdDispositivo":8,"temperatura":25,"humedad":60}"#);
    queue.close();
    store.set_available(false);

    let restore = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            store.set_available(true);
        })
    };

    service.run(queue.subscribe()).await.unwrap();
    restore.await.unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn live_sample_is_already_queryable() {
    let (queue, store, hub, service) = pipeline();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let feed_addr = listener.local_addr().unwrap();
    tokio::spawn(hub::serve_feed(listener, hub.clone()));

    let mut feed = BufReader::new(TcpStream::connect(feed_addr).await.unwrap());
    feed.get_mut().write_all(b"SUBSCRIBE readings\n").await.unwrap();
    let mut line = String::new();
    feed.read_line(&mut line).await.unwrap();
    assert_eq!(line.trim(), "OK readings");

    let producer = queue.clone();
    let ingest = tokio::spawn(async move { service.run(queue.subscribe()).await });
    let mut generator = GeneratorBuilder::new().device_id(6).build(producer.connector());

    for _ in 0..3 {
        generator.tick().await.unwrap();

        line.clear();
        feed.read_line(&mut line).await.unwrap();
        let live: Value = serde_json::from_str(&line).unwrap();

        let reply = query::route(&Method::GET, "/api/readings/by-device/6", store.as_ref()).await;
        let history: Vec<Value> = serde_json::from_str(&reply.body).unwrap();
        assert!(history.iter().any(|h| h["id"] == live["id"]));
    }

    producer.close();
    ingest.await.unwrap().unwrap();
}
