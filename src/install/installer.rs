//! Download + extract + re-verify for one slot dependency

use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::catalog::DependencyKind;
use super::detection::Verifier;
use super::download::{ArchiveKind, ExtractRequest, Fetcher, extract};
use super::error::{Failure, FailureKind, FailureStage};
use super::progress::{BootstrapPhase, ItemTracker};
use crate::config::Settings;

/// Installs archives into their canonical slots, one at a time
#[derive(Debug, Clone)]
pub struct SlotInstaller {
    fetcher: Fetcher,
    verifier: Verifier,
    download_dir: PathBuf,
    scratch_base: PathBuf,
    tool_timeout: Duration,
    settle_delay: Duration,
}

impl SlotInstaller {
    pub fn new(settings: &Settings, fetcher: Fetcher, verifier: Verifier) -> Self {
        let capabilities = verifier.platform().capabilities();
        let scratch_base = settings
            .scratch_base
            .clone()
            .or(capabilities.scratch_base)
            .unwrap_or_else(|| settings.libraries_root.clone());

        Self {
            fetcher,
            verifier,
            download_dir: settings.download_dir.clone(),
            scratch_base,
            tool_timeout: settings.timeouts.extract(),
            settle_delay: capabilities.handle_release_delay,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Fetch `url`, unpack it into the slot of `kind` and check its markers
    pub async fn install(
        &self,
        kind: DependencyKind,
        url: &str,
        tracker: &ItemTracker,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Failure> {
        let (archive, archive_kind) = self.download(kind, url, tracker, cancel).await?;
        self.unpack(kind, archive, archive_kind, tracker).await
    }

    /// Download step alone; returns the archive path and its format
    pub async fn download(
        &self,
        kind: DependencyKind,
        url: &str,
        tracker: &ItemTracker,
        cancel: &CancellationToken,
    ) -> Result<(PathBuf, ArchiveKind), Failure> {
        let spec = kind.slot_spec().ok_or_else(|| {
            Failure::new(
                FailureStage::Download,
                FailureKind::NetworkFailure,
                format!("{kind} is not an archive dependency"),
            )
        })?;
        let archive_kind = ArchiveKind::from_url(url).ok_or_else(|| {
            Failure::new(
                FailureStage::Extract,
                FailureKind::DecompressionFailure,
                format!("unsupported archive format: {url}"),
            )
        })?;

        let archive = self
            .download_dir
            .join(format!("{}{}", spec.slot, archive_kind.extension()));

        tracker.phase(BootstrapPhase::Downloading);
        self.fetcher
            .download(url, &archive, kind, |received, total| tracker.bytes(received, total), cancel)
            .await
            .map_err(|e| Failure::new(FailureStage::Download, e.kind(), e.to_string()))?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        Ok((archive, archive_kind))
    }

    /// Extract a downloaded archive and re-check the slot markers
    pub async fn unpack(
        &self,
        kind: DependencyKind,
        archive: PathBuf,
        archive_kind: ArchiveKind,
        tracker: &ItemTracker,
    ) -> Result<PathBuf, Failure> {
        let Some(spec) = kind.slot_spec() else {
            return Err(Failure::new(
                FailureStage::Extract,
                FailureKind::LayoutVerificationFailure,
                format!("{kind} has no slot"),
            ));
        };

        tracker.phase(BootstrapPhase::Extracting);
        let request = ExtractRequest {
            archive: &archive,
            kind: archive_kind,
            dest_root: self.verifier.libraries_root(),
            slot: spec.slot,
            prefixes: spec.prefixes,
            scratch_base: &self.scratch_base,
            tool_timeout: self.tool_timeout,
        };
        let slot = extract(&request)
            .await
            .map_err(|e| Failure::new(FailureStage::Extract, e.kind(), e.to_string()))?;

        let missing = self.verifier.missing_markers(kind);
        if let Some(first) = missing.first() {
            warn!("{} extracted but {} markers are missing", kind, missing.len());
            return Err(Failure::new(
                FailureStage::Verify,
                FailureKind::LayoutVerificationFailure,
                format!("missing {}", first.display()),
            ));
        }

        info!("{} installed at {}", kind.label(), slot.display());
        Ok(slot)
    }
}
