//! Historical query HTTP server.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /api/readings/recent` | newest 50 samples across all devices |
//! | `GET /api/readings/by-device/{deviceId}` | newest 50 samples for one device |
//! | `GET /health` | `OK` |
//!
//! Errors are answered with a JSON body
//! `{"timestamp", "status", "error", "message"}`.

use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use sensorwatch_types::{DeviceId, HISTORY_LIMIT};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::store::SampleStore;

const RECENT_PATH: &str = "/api/readings/recent";
const BY_DEVICE_PREFIX: &str = "/api/readings/by-device/";

/// A rendered response, independent of the HTTP plumbing.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn json(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message.into(),
        });
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

/// Answer one request against `store`.
pub async fn route<S: SampleStore + ?Sized>(method: &Method, path: &str, store: &S) -> Reply {
    let device = if path == RECENT_PATH {
        None
    } else if let Some(segment) = path.strip_prefix(BY_DEVICE_PREFIX) {
        match DeviceId::new(segment).filter(|_| !segment.contains('/')) {
            Some(device) => Some(device),
            None => return Reply::error(StatusCode::NOT_FOUND, format!("no route for {path}")),
        }
    } else if path == "/health" {
        if method != Method::GET {
            return Reply::error(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported");
        }
        return Reply {
            status: StatusCode::OK,
            content_type: "text/plain",
            body: "OK".to_string(),
        };
    } else {
        return Reply::error(StatusCode::NOT_FOUND, format!("no route for {path}"));
    };

    if method != Method::GET {
        return Reply::error(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported");
    }

    match store.recent(device.as_ref(), HISTORY_LIMIT).await {
        Ok(samples) => match serde_json::to_string(&samples) {
            Ok(body) => Reply::json(body),
            Err(e) => Reply::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => {
            error!(event = "query_failed", path, error = %e, "Historical query failed");
            Reply::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Serve historical queries until the listener fails.
pub async fn serve_query<S>(listener: TcpListener, store: Arc<S>) -> std::io::Result<()>
where
    S: SampleStore + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Query server listening");
    }
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let store = store.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let store = store.clone();
                async move { handle_request(req, store.as_ref()).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(error = %e, "Query connection error");
            }
        });
    }
}

async fn handle_request<S: SampleStore + ?Sized>(
    req: Request<hyper::body::Incoming>,
    store: &S,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    drop(req);
    let reply = route(&method, &path, store).await;

    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() = reply.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use sensorwatch_types::ValidatedSample;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn store_with(devices: &[i64]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, device) in devices.iter().enumerate() {
            store
                .insert(ValidatedSample {
                    generated_at: Utc::now(),
                    device_id: DeviceId::from(*device),
                    temperature: 20.0 + i as f64,
                    humidity: 50.0,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn recent_is_capped_and_newest_first() {
        let devices: Vec<i64> = (0..60).map(|i| i % 3).collect();
        let store = store_with(&devices).await;

        let reply = route(&Method::GET, RECENT_PATH, &store).await;
        assert_eq!(reply.status, StatusCode::OK);
        let body: Vec<Value> = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body.len(), HISTORY_LIMIT);
        assert_eq!(body[0]["id"], 60);
        assert_eq!(body[49]["id"], 11);
    }

    #[tokio::test]
    async fn by_device_filters() {
        let store = store_with(&[1, 2, 1]).await;
        let reply = route(&Method::GET, "/api/readings/by-device/1", &store).await;
        let body: Vec<Value> = serde_json::from_str(&reply.body).unwrap();
        let ids: Vec<u64> = body.iter().map(|v| v["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn unknown_route_and_method() {
        let store = MemoryStore::new();
        let reply = route(&Method::GET, "/api/nope", &store).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "Not Found");

        let reply = route(&Method::POST, RECENT_PATH, &store).await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn store_failure_is_500() {
        let store = MemoryStore::new();
        store.set_available(false);
        let reply = route(&Method::GET, RECENT_PATH, &store).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["status"], 500);
        assert!(body["message"].as_str().unwrap().contains("unavailable"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn serves_health_over_http() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_query(listener, Arc::new(MemoryStore::new())));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("OK"));
    }
}
