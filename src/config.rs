use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top‑level bootstrap settings. `Default` carries the compiled-in values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root under which every dependency gets its own slot directory
    pub libraries_root: PathBuf,
    /// Where downloaded archives are written before extraction
    pub download_dir: PathBuf,
    /// Overrides the platform's preferred extraction scratch base
    pub scratch_base: Option<PathBuf>,
    /// Directory holding the firmware configure script and build output
    pub build_dir: PathBuf,
    pub sources: Sources,
    pub timeouts: Timeouts,
}

/// Download locations for every dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub display_library_url: String,
    pub hardware_sdk_url: String,
    /// Platform suffix is appended (e.g. `x86_64-arm-none-eabi.tar.xz`)
    pub toolchain_base_url: String,
    /// Platform suffix is appended (e.g. `linux-x86_64.tar.gz`)
    pub build_tool_base_url: String,
    pub firmware_tags_api_url: String,
    /// `<tag>.zip` is appended
    pub firmware_archive_base_url: String,
    pub interpreter_windows_url: String,
    pub interpreter_linux_url: String,
    pub interpreter_macos_x86_64_url: String,
    pub interpreter_macos_arm64_url: String,
    pub package_manager_bootstrap_url: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            display_library_url: "https://github.com/lvgl/lvgl/archive/refs/tags/v9.3.0.zip".to_string(),
            hardware_sdk_url: "https://nsscprodmedia.blob.core.windows.net/prod/software-and-other-downloads/sdks/nrf5/binaries/nrf5_sdk_17.1.0_ddde560.zip".to_string(),
            toolchain_base_url: "https://developer.arm.com/-/media/Files/downloads/gnu/13.2.rel1/binrel/arm-gnu-toolchain-13.2.rel1-".to_string(),
            build_tool_base_url: "https://github.com/Kitware/CMake/releases/download/v4.1.0/cmake-4.1.0-".to_string(),
            firmware_tags_api_url: "https://api.github.com/repos/INFIseven/nrf52-lcd-tester-fw/tags".to_string(),
            firmware_archive_base_url: "https://github.com/INFIseven/nrf52-lcd-tester-fw/archive/refs/tags/".to_string(),
            interpreter_windows_url: "https://www.python.org/ftp/python/3.11.9/python-3.11.9-embed-amd64.zip".to_string(),
            interpreter_linux_url: "https://github.com/indygreg/python-build-standalone/releases/download/20240415/cpython-3.11.9+20240415-x86_64-unknown-linux-gnu-install_only.tar.gz".to_string(),
            interpreter_macos_x86_64_url: "https://github.com/indygreg/python-build-standalone/releases/download/20240415/cpython-3.11.9+20240415-x86_64-apple-darwin-install_only.tar.gz".to_string(),
            interpreter_macos_arm64_url: "https://github.com/indygreg/python-build-standalone/releases/download/20240415/cpython-3.11.9+20240415-aarch64-apple-darwin-install_only.tar.gz".to_string(),
            package_manager_bootstrap_url: "https://bootstrap.pypa.io/get-pip.py".to_string(),
        }
    }
}

/// Bounded waits, in seconds. A timeout is always a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub probe_secs: u64,
    pub extract_secs: u64,
    pub package_install_secs: u64,
    pub package_manager_bootstrap_secs: u64,
    pub script_secs: u64,
    pub connect_secs: u64,
    pub download_inactivity_secs: u64,
    pub firmware_build_secs: u64,
    pub flash_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: 5,
            extract_secs: 120,
            package_install_secs: 120,
            package_manager_bootstrap_secs: 120,
            script_secs: 30,
            connect_secs: 30,
            download_inactivity_secs: 300,
            firmware_build_secs: 300,
            flash_secs: 60,
        }
    }
}

impl Timeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn extract(&self) -> Duration {
        Duration::from_secs(self.extract_secs)
    }

    pub fn package_install(&self) -> Duration {
        Duration::from_secs(self.package_install_secs)
    }

    pub fn package_manager_bootstrap(&self) -> Duration {
        Duration::from_secs(self.package_manager_bootstrap_secs)
    }

    pub fn script(&self) -> Duration {
        Duration::from_secs(self.script_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn download_inactivity(&self) -> Duration {
        Duration::from_secs(self.download_inactivity_secs)
    }

    pub fn firmware_build(&self) -> Duration {
        Duration::from_secs(self.firmware_build_secs)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_secs(self.flash_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        let app_dir = application_dir();
        Self::for_app_dir(&app_dir)
    }
}

impl Settings {
    /// Settings rooted at `app_dir` (`<app_dir>/libraries`, `<app_dir>/build_mcu`)
    pub fn for_app_dir(app_dir: &Path) -> Self {
        Self {
            libraries_root: app_dir.join("libraries"),
            download_dir: std::env::temp_dir(),
            scratch_base: None,
            build_dir: app_dir.join("build_mcu"),
            sources: Sources::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Load settings from a TOML file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Directory containing the running executable, falling back to the working directory
fn application_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_compiled_in_defaults() {
        let settings = Settings::from_toml(
            r#"
            libraries_root = "/opt/lcd/libraries"

            [timeouts]
            probe_secs = 9
            "#,
        )
        .expect("settings should parse");

        assert_eq!(settings.libraries_root, PathBuf::from("/opt/lcd/libraries"));
        assert_eq!(settings.timeouts.probe(), Duration::from_secs(9));
        assert_eq!(settings.timeouts.package_install(), Duration::from_secs(120));
        assert_eq!(settings.sources.display_library_url, Sources::default().display_library_url);
    }

    #[test]
    fn app_dir_layout() {
        let settings = Settings::for_app_dir(Path::new("/apps/lcd"));
        assert_eq!(settings.libraries_root, PathBuf::from("/apps/lcd/libraries"));
        assert_eq!(settings.build_dir, PathBuf::from("/apps/lcd/build_mcu"));
    }
}
