//! Dependency bootstrap
//!
//! Detects, downloads, extracts and verifies everything the LCD tester needs
//! on disk before it can convert images or build firmware: LVGL, the nRF5
//! SDK, the ARM cross toolchain, the tester firmware sources, CMake and a
//! portable Python runtime with its packages.
//!
//! Entry point is [`Bootstrapper`]; [`Verifier`] answers presence questions
//! without touching the network.

mod catalog;
mod detection;
mod download;
mod error;
mod installer;
mod interpreter;
mod orchestration;
mod platform;
mod process;
mod progress;

#[cfg(test)]
mod test_support;

pub use catalog::{
    DependencyKind, Marker, PackageSpec, REQUIRED_PACKAGES, SLOT_KINDS, SlotSpec, package_spec,
    required_kinds,
};
pub use detection::Verifier;
pub use download::{ArchiveKind, ExtractRequest, FetchJob, Fetcher, USER_AGENT, extract, github};
pub use error::{
    ExtractError, Failure, FailureKind, FailureStage, FetchError, ProcessError, ReleaseLookupError,
};
pub use installer::SlotInstaller;
pub use interpreter::{InterpreterManager, SetupStage};
pub use orchestration::{BootstrapReport, Bootstrapper, DependencyReport};
pub use platform::{
    Architecture, DownloadSource, OperatingSystem, PlatformCapabilities, PlatformDescriptor,
    url_for,
};
pub use process::{ToolOutput, run_with_timeout};
pub use progress::{BootstrapPhase, BootstrapProgress, ItemTracker, ProgressSink};
