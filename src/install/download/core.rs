//! Archive download with progress tracking and cancellation

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::Timeouts;
use crate::install::catalog::DependencyKind;
use crate::install::error::FetchError;

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("lcdtester/", env!("CARGO_PKG_VERSION"));

/// Emit progress at most once per this many bytes (plus at completion)
const PROGRESS_STEP_BYTES: u64 = 256 * 1024;

/// HTTP archive fetcher. Only one [`FetchJob`] may be in flight at a time.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    inactivity_timeout: Duration,
    in_flight: Arc<AtomicBool>,
}

/// One download attempt. Owns the in-flight slot of its [`Fetcher`] until
/// it is consumed by [`FetchJob::run`] or dropped.
#[derive(Debug)]
pub struct FetchJob {
    pub url: String,
    pub destination: PathBuf,
    pub kind: DependencyKind,
    client: reqwest::Client,
    inactivity_timeout: Duration,
    _slot: InFlightSlot,
}

#[derive(Debug)]
struct InFlightSlot(Arc<AtomicBool>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Fetcher {
    pub fn new(timeouts: &Timeouts) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            inactivity_timeout: timeouts.download_inactivity(),
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Claim the in-flight slot for a new job
    pub fn begin(
        &self,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        kind: DependencyKind,
    ) -> Result<FetchJob, FetchError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FetchError::Busy);
        }

        Ok(FetchJob {
            url: url.into(),
            destination: destination.into(),
            kind,
            client: self.client.clone(),
            inactivity_timeout: self.inactivity_timeout,
            _slot: InFlightSlot(Arc::clone(&self.in_flight)),
        })
    }

    /// Download `url` to `destination`, returning the byte count
    pub async fn download<F>(
        &self,
        url: &str,
        destination: &Path,
        kind: DependencyKind,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError>
    where
        F: FnMut(u64, Option<u64>),
    {
        self.begin(url, destination, kind)?.run(on_progress, cancel).await
    }
}

impl FetchJob {
    /// Perform the transfer.
    ///
    /// The body is streamed into `<destination>.part` and renamed into place
    /// once flushed, so `destination` only ever holds a complete file. On
    /// cancellation or a network error the partial file is removed.
    pub async fn run<F>(
        self,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let partial = partial_path(&self.destination);
        let _ = tokio::fs::remove_file(&self.destination).await;

        info!("Downloading {} from {}", self.kind, self.url);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Canceled),
            result = self.transfer(&partial, &mut on_progress) => result,
        };

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &self.destination)
                    .await
                    .map_err(|source| FetchError::Write {
                        path: self.destination.clone(),
                        source,
                    })?;
                info!(
                    "Downloaded {} ({} bytes) to {}",
                    self.kind,
                    bytes,
                    self.destination.display()
                );
                Ok(bytes)
            }
            Err(err @ FetchError::Write { .. }) => {
                warn!("Download of {} failed: {}", self.kind, err);
                Err(err)
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                warn!("Download of {} failed: {}", self.kind, err);
                Err(err)
            }
        }
    }

    async fn transfer<F>(&self, partial: &Path, on_progress: &mut F) -> Result<u64, FetchError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let network = |message: String| FetchError::Network {
            url: self.url.clone(),
            message,
        };
        let write = |source: std::io::Error| FetchError::Write {
            path: partial.to_path_buf(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }

        let total = response.content_length();
        debug!("{} reports {:?} bytes", self.url, total);

        if let Some(parent) = partial.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write)?;
        }
        let mut file = tokio::fs::File::create(partial).await.map_err(write)?;

        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        let mut last_reported: u64 = 0;
        on_progress(0, total);

        loop {
            // Wrap stream.next() with timeout to detect a stalled transfer
            let chunk = match timeout(self.inactivity_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(network(e.to_string())),
                Ok(None) => break,
                Err(_) => {
                    return Err(network(format!(
                        "no data received for {} seconds after {} bytes",
                        self.inactivity_timeout.as_secs(),
                        received
                    )));
                }
            };

            file.write_all(&chunk).await.map_err(write)?;
            received += chunk.len() as u64;

            if received - last_reported >= PROGRESS_STEP_BYTES {
                on_progress(received, total);
                last_reported = received;
            }
        }

        if last_reported != received {
            on_progress(received, total);
        }

        file.flush().await.map_err(write)?;
        file.sync_all().await.map_err(write)?;
        drop(file);

        Ok(received)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
