//! Platform detection and per-platform artifact selection
//!
//! Every OS/architecture conditional of the bootstrap lives here. The rest of
//! the subsystem consumes a [`PlatformDescriptor`] and its
//! [`PlatformCapabilities`] record instead of branching on `cfg!` itself.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::OnceCell;

use super::catalog::DependencyKind;
use crate::config::Sources;

/// Operating systems the bootstrap knows artifacts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingSystem {
    Windows,
    Linux,
    MacOs,
    /// Anything else; resolved with the Linux artifacts
    Other,
}

/// CPU architectures the bootstrap distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Arm64,
}

/// Immutable (OS, architecture) pair, detected once per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformDescriptor {
    pub os: OperatingSystem,
    pub arch: Architecture,
}

/// Small capability record derived from a [`PlatformDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Suffix appended to executable marker files (`.exe` on Windows)
    pub executable_suffix: &'static str,
    /// Interpreter binary, relative to the interpreter slot
    pub interpreter_executable: &'static str,
    /// The portable interpreter ships without pip and needs `get-pip.py`
    pub needs_package_manager_bootstrap: bool,
    /// `pip install` runs with `--user`
    pub user_package_install: bool,
    /// Pause between writing a download and extracting it
    pub handle_release_delay: Duration,
    /// Short scratch location for extraction; `None` means the libraries root
    pub scratch_base: Option<PathBuf>,
}

/// Global cache for platform detection (initialized once, used everywhere)
static PLATFORM_CACHE: OnceCell<PlatformDescriptor> = OnceCell::new();

impl PlatformDescriptor {
    pub const fn new(os: OperatingSystem, arch: Architecture) -> Self {
        Self { os, arch }
    }

    /// Detect the running platform (cached after first call). Never fails.
    pub fn resolve() -> Self {
        *PLATFORM_CACHE
            .get_or_init(|| Self::from_consts(std::env::consts::OS, std::env::consts::ARCH))
    }

    fn from_consts(os: &str, arch: &str) -> Self {
        let os = match os {
            "windows" => OperatingSystem::Windows,
            "linux" => OperatingSystem::Linux,
            "macos" => OperatingSystem::MacOs,
            _ => OperatingSystem::Other,
        };

        // Only macOS ships distinct artifacts per architecture; elsewhere the
        // detected arch is informational
        let arch = match arch {
            "aarch64" | "arm64" => Architecture::Arm64,
            _ => Architecture::X86_64,
        };

        Self { os, arch }
    }

    /// OS whose artifacts are actually downloaded for this platform
    fn artifact_os(&self) -> OperatingSystem {
        match self.os {
            OperatingSystem::Other => OperatingSystem::Linux,
            os => os,
        }
    }

    /// Executable suffix for this platform
    pub fn executable_suffix(&self) -> &'static str {
        match self.os {
            OperatingSystem::Windows => ".exe",
            _ => "",
        }
    }

    pub fn capabilities(&self) -> PlatformCapabilities {
        match self.os {
            OperatingSystem::Windows => PlatformCapabilities {
                executable_suffix: self.executable_suffix(),
                interpreter_executable: "python.exe",
                needs_package_manager_bootstrap: true,
                user_package_install: true,
                handle_release_delay: Duration::from_secs(1),
                scratch_base: Some(PathBuf::from(r"C:\Temp")),
            },
            _ => PlatformCapabilities {
                executable_suffix: self.executable_suffix(),
                interpreter_executable: "bin/python3",
                needs_package_manager_bootstrap: false,
                user_package_install: false,
                handle_release_delay: Duration::ZERO,
                scratch_base: None,
            },
        }
    }

    /// Platform-specific artifact suffix for the cross toolchain
    fn toolchain_suffix(&self) -> &'static str {
        match (self.artifact_os(), self.arch) {
            (OperatingSystem::Windows, _) => "mingw-w64-i686-arm-none-eabi.zip",
            (OperatingSystem::MacOs, Architecture::Arm64) => "darwin-arm64-arm-none-eabi.tar.xz",
            (OperatingSystem::MacOs, Architecture::X86_64) => "darwin-x86_64-arm-none-eabi.tar.xz",
            _ => "x86_64-arm-none-eabi.tar.xz",
        }
    }

    /// Platform-specific artifact suffix for the build tool
    fn build_tool_suffix(&self) -> &'static str {
        match self.artifact_os() {
            OperatingSystem::Windows => "windows-x86_64.zip",
            OperatingSystem::MacOs => "macos-universal.tar.gz",
            _ => "linux-x86_64.tar.gz",
        }
    }
}

/// Where the archive for a dependency comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// A direct archive URL
    Direct(String),
    /// Newest tag of a release listing, appended to an archive base as `<tag>.zip`
    ReleaseTags { api_url: String, archive_base: String },
    /// Installed through the interpreter's package manager, not downloaded
    PackageManager,
}

/// Map a dependency kind to its download source on `platform`.
///
/// Pure function of its inputs; unknown operating systems fall back to the
/// Linux artifacts.
pub fn url_for(
    sources: &Sources,
    kind: DependencyKind,
    platform: &PlatformDescriptor,
) -> DownloadSource {
    match kind {
        DependencyKind::DisplayLibrary => {
            DownloadSource::Direct(sources.display_library_url.clone())
        }
        DependencyKind::HardwareSdk => DownloadSource::Direct(sources.hardware_sdk_url.clone()),
        DependencyKind::CrossToolchain => DownloadSource::Direct(format!(
            "{}{}",
            sources.toolchain_base_url,
            platform.toolchain_suffix()
        )),
        DependencyKind::BuildTool => DownloadSource::Direct(format!(
            "{}{}",
            sources.build_tool_base_url,
            platform.build_tool_suffix()
        )),
        DependencyKind::FirmwareSource => DownloadSource::ReleaseTags {
            api_url: sources.firmware_tags_api_url.clone(),
            archive_base: sources.firmware_archive_base_url.clone(),
        },
        DependencyKind::PortableInterpreter => {
            let url = match (platform.artifact_os(), platform.arch) {
                (OperatingSystem::Windows, _) => &sources.interpreter_windows_url,
                (OperatingSystem::MacOs, Architecture::Arm64) => {
                    &sources.interpreter_macos_arm64_url
                }
                (OperatingSystem::MacOs, Architecture::X86_64) => {
                    &sources.interpreter_macos_x86_64_url
                }
                _ => &sources.interpreter_linux_url,
            };
            DownloadSource::Direct(url.clone())
        }
        DependencyKind::InterpreterPackage(_) => DownloadSource::PackageManager,
    }
}
