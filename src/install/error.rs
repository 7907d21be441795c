//! Error types for the bootstrap components
//!
//! Each component reports its own error enum; the orchestrator folds them
//! into a [`FailureKind`] attached to the dependency's report.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Archive fetcher failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("another download is already in flight")]
    Busy,

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download canceled")]
    Canceled,
}

/// Archive extractor failures
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("failed to move {} to {}: {message}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    #[error("extracted slot {} is missing or empty", .0.display())]
    Verification(PathBuf),
}

/// Subprocess failures
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("{program} exited with {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Release-listing lookup failures (firmware tag resolution)
#[derive(Debug, Error)]
pub enum ReleaseLookupError {
    #[error("release listing request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("release listing returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("release listing is not a tag array: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("release listing contains no named tags")]
    NoTags,
}

/// Failure taxonomy surfaced in dependency reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NetworkFailure,
    WriteFailure,
    DecompressionFailure,
    LayoutVerificationFailure,
    SubprocessTimeout,
    SubprocessNonZeroExit,
    ApiLookupFailure,
    Canceled,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Busy | FetchError::Network { .. } => FailureKind::NetworkFailure,
            FetchError::Write { .. } => FailureKind::WriteFailure,
            FetchError::Canceled => FailureKind::Canceled,
        }
    }
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::Decompression(_) => FailureKind::DecompressionFailure,
            ExtractError::Move { .. } | ExtractError::Verification(_) => {
                FailureKind::LayoutVerificationFailure
            }
        }
    }
}

impl ProcessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProcessError::Timeout { .. } => FailureKind::SubprocessTimeout,
            ProcessError::Spawn { .. } | ProcessError::NonZeroExit { .. } => {
                FailureKind::SubprocessNonZeroExit
            }
        }
    }
}

/// Where in a dependency's install path a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Lookup,
    Download,
    Extract,
    Verify,
    PackageManagerBootstrap,
    PackageInstall,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureStage::Lookup => "release lookup",
            FailureStage::Download => "download",
            FailureStage::Extract => "extraction",
            FailureStage::Verify => "verification",
            FailureStage::PackageManagerBootstrap => "package manager bootstrap",
            FailureStage::PackageInstall => "package install",
        };
        f.write_str(name)
    }
}

/// A dependency failure as carried by its report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {message}")]
pub struct Failure {
    pub stage: FailureStage,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(stage: FailureStage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}
