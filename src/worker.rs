//! Single-file transfer: stream one URL to its destination path.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::manifest::FileDescriptor;
use crate::source::{ByteStream, Source};

/// Downloads `file` to its destination, calling `on_chunk` with the size of
/// every chunk written.
///
/// The request and every chunk read are bounded by `timeout`; when it fires
/// the worker cancels its own token and fails with [`Error::Timeout`].
/// Cancelling `token` from outside fails the transfer with
/// [`Error::Cancelled`].
///
/// On any failure the partially written file is removed before returning.
/// Removal errors are logged and swallowed so the original error survives.
///
/// # Errors
///
/// Returns the first request, status, stream, or filesystem error.
pub async fn transfer<S, F>(
    source: &S,
    fs: &F,
    file: &FileDescriptor,
    token: CancellationToken,
    timeout: Duration,
    on_chunk: &(dyn Fn(u64) + Send + Sync),
) -> Result<u64>
where
    S: Source + ?Sized,
    F: FileSystem + ?Sized,
{
    if let Some(folder) = file.destination_folder() {
        fs.create_dir_all(folder).await?;
    }

    let mut out = fs.create_file(&file.path).await?;
    let result = stream_into(source, &mut out, file, &token, timeout, on_chunk).await;
    if result.is_err() {
        // Let an in-flight write land so the handle closes before removal.
        let _ = out.flush().await;
    }
    drop(out);

    match result {
        Ok(written) => Ok(written),
        Err(e) => {
            remove_partial(fs, &file.path).await;
            Err(e)
        }
    }
}

async fn stream_into<S>(
    source: &S,
    out: &mut tokio::fs::File,
    file: &FileDescriptor,
    token: &CancellationToken,
    timeout: Duration,
    on_chunk: &(dyn Fn(u64) + Send + Sync),
) -> Result<u64>
where
    S: Source + ?Sized,
{
    let mut body: ByteStream = bounded(token, timeout, source.open(&file.url)).await??;

    let mut written = 0u64;
    while let Some(chunk) = bounded(token, timeout, body.next()).await? {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        let len = chunk.len() as u64;
        written += len;
        on_chunk(len);
    }
    out.flush().await?;
    // An abort that lands during the flush must not leave a finished file behind.
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    Ok(written)
}

/// Races `fut` against cancellation and the per-file timeout.
async fn bounded<T>(
    token: &CancellationToken,
    timeout: Duration,
    fut: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.map_err(|_| {
            token.cancel();
            Error::Timeout { after: timeout }
        }),
    }
}

async fn remove_partial<F: FileSystem + ?Sized>(fs: &F, path: &Path) {
    if !fs.file_exists(path).await {
        return;
    }
    if let Err(e) = fs.remove_file(path).await {
        log::warn!("Failed to remove partial file {}: {e}", path.display());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::TokioFileSystem;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    /// One step of a scripted response body.
    #[derive(Clone)]
    pub enum Step {
        Chunk(usize),
        Wait(Duration),
        Fail(&'static str),
    }

    /// What a scripted URL does when opened.
    #[derive(Clone)]
    pub enum Script {
        Body(Vec<Step>),
        Status(u16),
        Hang,
    }

    /// A `Source` serving scripted responses, optionally different per attempt.
    #[derive(Default)]
    pub struct ScriptedSource {
        scripts: Mutex<HashMap<String, Vec<Script>>>,
        opened: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a script for `url`. Successive calls queue scripts for successive attempts;
        /// the last one repeats.
        pub fn script(self, url: &str, script: Script) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(script);
            self
        }

        pub fn body(self, url: &str, sizes: &[usize]) -> Self {
            let steps = sizes.iter().map(|&n| Step::Chunk(n)).collect();
            self.script(url, Script::Body(steps))
        }

        pub fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Source for ScriptedSource {
        async fn open(&self, url: &str) -> Result<ByteStream> {
            self.opened.lock().unwrap().push(url.to_string());
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.get_mut(url).expect("unscripted url");
                if queue.len() > 1 {
                    queue.remove(0)
                } else {
                    queue[0].clone()
                }
            };

            match script {
                Script::Status(code) => Err(Error::status(
                    reqwest::StatusCode::from_u16(code).unwrap(),
                    url,
                )),
                Script::Hang => futures::future::pending().await,
                Script::Body(steps) => Ok(futures::stream::iter(steps)
                    .then(|step| async move {
                        match step {
                            Step::Chunk(n) => Some(Ok(Bytes::from(vec![b'x'; n]))),
                            Step::Wait(d) => {
                                tokio::time::sleep(d).await;
                                None
                            }
                            Step::Fail(msg) => Some(Err(Error::Io(std::io::Error::new(
                                std::io::ErrorKind::ConnectionReset,
                                msg,
                            )))),
                        }
                    })
                    .filter_map(|item| async move { item })
                    .boxed()),
            }
        }
    }

    fn counter() -> (std::sync::Arc<AtomicU64>, impl Fn(u64) + Send + Sync) {
        let total = std::sync::Arc::new(AtomicU64::new(0));
        let sink = std::sync::Arc::clone(&total);
        (total, move |n| {
            sink.fetch_add(n, Ordering::Relaxed);
        })
    }

    #[tokio::test]
    async fn writes_full_body_and_creates_folders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().body("u://a", &[100, 50]);
        let (total, on_chunk) = counter();

        let written = transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(5),
            &on_chunk,
        )
        .await
        .unwrap();

        assert_eq!(written, 150);
        assert_eq!(total.load(Ordering::Relaxed), 150);
        assert_eq!(std::fs::read(&path).unwrap().len(), 150);
    }

    #[tokio::test]
    async fn truncates_existing_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().body("u://a", &[10]);

        transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(5),
            &|_| {},
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&path).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn status_error_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().script("u://a", Script::Status(404));

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(5),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Status { status: 404, .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn mid_stream_failure_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().script(
            "u://a",
            Script::Body(vec![Step::Chunk(64), Step::Fail("connection reset")]),
        );
        let (total, on_chunk) = counter();

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(5),
            &on_chunk,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(total.load(Ordering::Relaxed), 64);
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().script("u://a", Script::Hang);
        let token = CancellationToken::new();

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            token.clone(),
            Duration::from_millis(250),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(token.is_cancelled());
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().script(
            "u://a",
            Script::Body(vec![Step::Chunk(8), Step::Wait(Duration::from_secs(60))]),
        );

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(1),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancellation_fails_with_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let source = ScriptedSource::new().script(
            "u://a",
            Script::Body(vec![Step::Chunk(8), Step::Wait(Duration::from_secs(5))]),
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            token,
            Duration::from_secs(30),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(!path.exists());
    }

    /// Serves one chunk, then cancels `token` as the body ends.
    struct CancelAtEnd {
        token: CancellationToken,
    }

    #[async_trait]
    impl Source for CancelAtEnd {
        async fn open(&self, _url: &str) -> Result<ByteStream> {
            let token = self.token.clone();
            let end = futures::stream::poll_fn(move |_| {
                token.cancel();
                std::task::Poll::Ready(None)
            });
            Ok(futures::stream::iter([Ok(Bytes::from_static(b"complete body"))])
                .chain(end)
                .boxed())
        }
    }

    #[tokio::test]
    async fn abort_at_end_of_body_discards_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        let file = FileDescriptor::new("u://a", &path);
        let token = CancellationToken::new();
        let source = CancelAtEnd {
            token: token.clone(),
        };

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            token,
            Duration::from_secs(5),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failure_after_large_write_leaves_folder_empty() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("natives");
        let path = folder.join("big.bin");
        let file = FileDescriptor::new("u://big", &path);
        let source = ScriptedSource::new().script(
            "u://big",
            Script::Body(vec![Step::Chunk(4 << 20), Step::Fail("connection reset by peer")]),
        );

        let err = transfer(
            &source,
            &TokioFileSystem,
            &file,
            CancellationToken::new(),
            Duration::from_secs(5),
            &|_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
        // Fails if the partial file (or a handle recreating it) is still around.
        std::fs::remove_dir(&folder).unwrap();
    }
}
