//! End-to-end batch downloads against a local HTTP server.

use std::time::Duration;

use bulk_dl::{
    BatchEvent, DownloadConfig, Downloader, Error, FileDescriptor, Manifest, RetryPolicy,
};
use httpmock::prelude::*;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn config() -> DownloadConfig {
    DownloadConfig::new()
        .with_concurrency_limit(2)
        .with_per_file_timeout(Duration::from_secs(5))
        .with_retry_delay(Duration::from_millis(10))
}

async fn collect(mut rx: mpsc::UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn downloads_manifest_files_to_disk() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();

    let mut files = Vec::new();
    for (name, size) in [("a.jar", 100), ("b.jar", 200), ("c.jar", 300)] {
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/{name}"));
                then.status(200).body(vec![b'x'; size]);
            })
            .await;
        files.push(
            FileDescriptor::new(server.url(format!("/{name}")), format!("libraries/{name}"))
                .with_type("libraries")
                .with_size(size as u64),
        );
    }
    let manifest = Manifest { files }.rooted_at(dir.path());
    let total = manifest.total_size();
    assert_eq!(total, 600);

    let downloader = Downloader::new(reqwest::Client::new(), config());
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = downloader
        .download_batch(manifest.files, total, &tx)
        .await
        .unwrap();
    drop(tx);
    let events = collect(rx).await;

    assert_eq!(stats.files_downloaded, 3);
    assert_eq!(stats.total_bytes, 600);
    for (name, size) in [("a.jar", 100), ("b.jar", 200), ("c.jar", 300)] {
        let bytes = std::fs::read(dir.path().join("libraries").join(name)).unwrap();
        assert_eq!(bytes.len(), size);
    }

    let last_progress = events.iter().rev().find_map(|event| match event {
        BatchEvent::Progress {
            downloaded, total, ..
        } => Some((*downloaded, *total)),
        _ => None,
    });
    assert_eq!(last_progress, Some((600, 600)));
    assert!(matches!(events.last(), Some(BatchEvent::Complete)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn missing_file_aborts_batch_and_cleans_up() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone.zip");
            then.status(404);
        })
        .await;

    let files = vec![
        FileDescriptor::new(server.url("/gone.zip"), dir.path().join("natives/gone.zip"))
            .with_type("natives"),
    ];

    let downloader = Downloader::new(reqwest::Client::new(), config());
    let (tx, rx) = mpsc::unbounded_channel();
    let result = downloader.download_batch(files, 0, &tx).await;
    drop(tx);
    let events = collect(rx).await;

    let Err(Error::Aborted(presented)) = result else {
        panic!("expected an aborted batch, got {result:?}");
    };
    assert_eq!(
        presented.file.as_deref(),
        Some(dir.path().join("natives/gone.zip").as_path())
    );
    assert!(presented.details.as_deref().unwrap_or_default().contains("404"));
    assert!(!dir.path().join("natives/gone.zip").exists());
    assert!(matches!(events.last(), Some(BatchEvent::Error(_))));
}

#[tokio::test]
async fn lenient_batch_skips_missing_file() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone.zip");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ok.zip");
            then.status(200).body("payload");
        })
        .await;

    let files = vec![
        FileDescriptor::new(server.url("/gone.zip"), dir.path().join("gone.zip")),
        FileDescriptor::new(server.url("/ok.zip"), dir.path().join("ok.zip")).with_size(7),
    ];

    let downloader = Downloader::new(
        reqwest::Client::new(),
        config().with_retry_policy(RetryPolicy::Lenient),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = downloader.download_batch(files, 7, &tx).await.unwrap();
    drop(tx);
    let events = collect(rx).await;

    assert_eq!(stats.files_downloaded, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(std::fs::read(dir.path().join("ok.zip")).unwrap(), b"payload");
    assert!(!dir.path().join("gone.zip").exists());
    assert!(events.iter().any(|e| matches!(e, BatchEvent::FileError(_))));
    assert!(matches!(events.last(), Some(BatchEvent::Complete)));
}

#[tokio::test]
async fn empty_manifest_completes_immediately() {
    let manifest = Manifest::from_json(r#"{"files": []}"#).unwrap();
    let downloader = Downloader::new(reqwest::Client::new(), config());
    let (tx, rx) = mpsc::unbounded_channel();

    let stats = downloader
        .download_batch(manifest.files, 0, &tx)
        .await
        .unwrap();
    drop(tx);
    let events = collect(rx).await;

    assert_eq!(stats.files_downloaded, 0);
    assert!(matches!(events.as_slice(), [BatchEvent::Complete]));
}
