//! Object store adapter tests.
//!
//! The remote tests bind throwaway axum servers on ephemeral ports so the
//! upload, degradation, fetch-fallback, and timeout paths run against real
//! HTTP exchanges.

use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use stillcut::{ObjectStore, RemoteStoreConfig, StillcutError, StoreOutcome};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

fn remote_store(addr: SocketAddr, timeout: Duration) -> ObjectStore {
    ObjectStore::remote(RemoteStoreConfig {
        endpoint: format!("http://{addr}"),
        bucket: "frames".to_string(),
        api_key: "test-key".to_string(),
        timeout,
    })
    .expect("build store")
}

fn frame_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("clip-0000.jpg");
    std::fs::write(&path, b"jpeg bytes").expect("write");
    path
}

// ── disabled pass-through ──────────────────────────────────────────

#[tokio::test]
async fn disabled_store_returns_the_local_path_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let store = ObjectStore::disabled().expect("build store");
    assert!(!store.is_remote());

    let outcome = store.store(&frame, "clip-0000.jpg").await;
    assert_eq!(
        outcome,
        StoreOutcome::Stored(frame.to_string_lossy().into_owned()),
    );

    // The pass-through never consumes the file.
    assert!(frame.exists());
}

#[tokio::test]
async fn disabled_store_fetches_from_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let store = ObjectStore::disabled().expect("build store");
    let bytes = store
        .fetch(&frame.to_string_lossy())
        .await
        .expect("fetch failed");
    assert_eq!(bytes, b"jpeg bytes");
}

#[tokio::test]
async fn fetching_a_missing_local_path_is_a_fetch_error() {
    let store = ObjectStore::disabled().expect("build store");
    let result = store.fetch("/definitely/not/here.jpg").await;

    match result {
        Err(StillcutError::Fetch { locator, .. }) => {
            assert_eq!(locator, "/definitely/not/here.jpg");
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
}

// ── remote upload ──────────────────────────────────────────────────

#[tokio::test]
async fn accepted_upload_yields_the_public_locator() {
    async fn accept_upload() -> StatusCode {
        StatusCode::OK
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let addr = serve(Router::new().route("/object/{bucket}/{name}", post(accept_upload))).await;
    let store = remote_store(addr, Duration::from_secs(5));
    assert!(store.is_remote());

    let outcome = store.store(&frame, "clip-0000.jpg").await;
    assert_eq!(
        outcome,
        StoreOutcome::Stored(format!(
            "http://{addr}/object/public/frames/clip-0000.jpg"
        )),
    );
}

#[tokio::test]
async fn rejected_upload_degrades_with_the_intended_locator() {
    async fn reject_upload() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let addr = serve(Router::new().route("/object/{bucket}/{name}", post(reject_upload))).await;
    let store = remote_store(addr, Duration::from_secs(5));

    match store.store(&frame, "clip-0000.jpg").await {
        StoreOutcome::Degraded { locator, reason } => {
            assert_eq!(
                locator,
                format!("http://{addr}/object/public/frames/clip-0000.jpg"),
            );
            assert!(reason.contains("500"), "unexpected reason: {reason}");
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_store_degrades_instead_of_failing() {
    // Bind then drop the listener so the port is known dead.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let store = remote_store(addr, Duration::from_secs(5));
    match store.store(&frame, "clip-0000.jpg").await {
        StoreOutcome::Degraded { locator, reason } => {
            assert_eq!(
                locator,
                format!("http://{addr}/object/public/frames/clip-0000.jpg"),
            );
            assert!(
                reason.contains("store unreachable"),
                "unexpected reason: {reason}",
            );
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_store_is_cut_off_by_the_request_timeout() {
    async fn stall_forever() -> StatusCode {
        tokio::time::sleep(Duration::from_secs(60)).await;
        StatusCode::OK
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let frame = frame_file(&dir);

    let addr = serve(Router::new().route("/object/{bucket}/{name}", post(stall_forever))).await;
    let store = remote_store(addr, Duration::from_millis(250));

    let started = Instant::now();
    let outcome = store.store(&frame, "clip-0000.jpg").await;
    assert!(
        matches!(outcome, StoreOutcome::Degraded { .. }),
        "expected Degraded, got {outcome:?}",
    );
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "upload was not bounded by the timeout",
    );
}

// ── remote fetch resolution ────────────────────────────────────────

#[tokio::test]
async fn fetch_falls_back_to_the_authenticated_store_api() {
    async fn deny_public() -> StatusCode {
        StatusCode::FORBIDDEN
    }

    async fn serve_authenticated(headers: HeaderMap) -> (StatusCode, Vec<u8>) {
        let authorized = headers
            .get("authorization")
            .map(|value| value.as_bytes() == b"Bearer test-key")
            .unwrap_or(false);
        if authorized {
            (StatusCode::OK, b"frame bytes".to_vec())
        } else {
            (StatusCode::UNAUTHORIZED, Vec::new())
        }
    }

    let router = Router::new()
        .route("/object/public/{bucket}/{name}", get(deny_public))
        .route("/object/{bucket}/{name}", get(serve_authenticated));
    let addr = serve(router).await;
    let store = remote_store(addr, Duration::from_secs(5));

    let locator = format!("http://{addr}/object/public/frames/clip-0000.jpg");
    let bytes = store.fetch(&locator).await.expect("fetch failed");
    assert_eq!(bytes, b"frame bytes");
}

#[tokio::test]
async fn fetch_of_a_foreign_url_gets_no_authenticated_retry() {
    async fn deny_everything() -> StatusCode {
        StatusCode::FORBIDDEN
    }

    // The store is configured against one server; the locator points at
    // another, so only the direct GET applies.
    let store_addr = serve(Router::new()).await;
    let foreign_addr =
        serve(Router::new().route("/object/public/{bucket}/{name}", get(deny_everything))).await;
    let store = remote_store(store_addr, Duration::from_secs(5));

    let locator = format!("http://{foreign_addr}/object/public/frames/clip-0000.jpg");
    match store.fetch(&locator).await {
        Err(StillcutError::Fetch { locator: reported, reason }) => {
            assert_eq!(reported, locator);
            assert!(reason.contains("403"), "unexpected reason: {reason}");
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
}
