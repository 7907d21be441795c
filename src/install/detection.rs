//! Dependency presence detection
//!
//! A slot directory existing proves nothing on its own: a previous run may
//! have died half-way through an extraction. Presence therefore means:
//! - every marker file of the slot exists
//! - for the interpreter, `--version` also exits 0 within the probe timeout
//! - for an interpreter package, its import probe exits 0 through the interpreter
//!
//! Absence is a normal answer here, never an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use super::catalog::{DependencyKind, package_spec};
use super::platform::PlatformDescriptor;
use super::process::run_with_timeout;
use crate::config::Settings;

/// Read-only view of the libraries root
#[derive(Debug, Clone)]
pub struct Verifier {
    libraries_root: PathBuf,
    platform: PlatformDescriptor,
    probe_timeout: Duration,
}

impl Verifier {
    pub fn new(
        libraries_root: impl Into<PathBuf>,
        platform: PlatformDescriptor,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            libraries_root: libraries_root.into(),
            platform,
            probe_timeout,
        }
    }

    pub fn from_settings(settings: &Settings, platform: PlatformDescriptor) -> Self {
        Self::new(&settings.libraries_root, platform, settings.timeouts.probe())
    }

    pub fn libraries_root(&self) -> &Path {
        &self.libraries_root
    }

    pub fn platform(&self) -> &PlatformDescriptor {
        &self.platform
    }

    /// Canonical slot directory; `None` for interpreter packages
    pub fn slot_dir(&self, kind: DependencyKind) -> Option<PathBuf> {
        kind.slot_spec().map(|spec| self.libraries_root.join(spec.slot))
    }

    /// Interpreter binary inside its slot
    pub fn interpreter_path(&self) -> PathBuf {
        self.libraries_root
            .join("python")
            .join(self.platform.capabilities().interpreter_executable)
    }

    /// Absolute marker paths for `kind`, executable suffix applied
    pub fn marker_paths(&self, kind: DependencyKind) -> Vec<PathBuf> {
        let Some(spec) = kind.slot_spec() else {
            return Vec::new();
        };
        let slot = self.libraries_root.join(spec.slot);
        let suffix = self.platform.executable_suffix();

        let mut paths: Vec<PathBuf> = spec
            .markers
            .iter()
            .map(|marker| {
                if marker.executable {
                    slot.join(format!("{}{}", marker.path, suffix))
                } else {
                    slot.join(marker.path)
                }
            })
            .collect();

        if kind == DependencyKind::PortableInterpreter {
            paths.push(self.interpreter_path());
        }
        paths
    }

    /// Markers of `kind` that do not exist
    pub fn missing_markers(&self, kind: DependencyKind) -> Vec<PathBuf> {
        self.marker_paths(kind)
            .into_iter()
            .filter(|path| !path.exists())
            .collect()
    }

    pub async fn is_present(&self, kind: DependencyKind) -> bool {
        match kind {
            DependencyKind::InterpreterPackage(name) => self.package_importable(name).await,
            DependencyKind::PortableInterpreter => {
                self.markers_complete(kind) && self.interpreter_healthy().await
            }
            _ => self.markers_complete(kind),
        }
    }

    fn markers_complete(&self, kind: DependencyKind) -> bool {
        let missing = self.missing_markers(kind);
        if let Some(first) = missing.first() {
            debug!(
                "{} not present: {} missing ({} markers absent)",
                kind,
                first.display(),
                missing.len()
            );
            return false;
        }
        true
    }

    /// The interpreter binary exists and reports its version
    pub async fn interpreter_healthy(&self) -> bool {
        let interpreter = self.interpreter_path();
        if !interpreter.is_file() {
            return false;
        }

        match run_with_timeout(&interpreter, ["--version"], None, self.probe_timeout).await {
            Ok(output) if output.success() => {
                debug!("Interpreter reports {}", output.stdout.trim());
                true
            }
            Ok(output) => {
                warn!(
                    "Interpreter {} failed its version probe with {:?}: {}",
                    interpreter.display(),
                    output.code,
                    output.stderr.trim()
                );
                false
            }
            Err(e) => {
                warn!("Interpreter version probe failed: {e}");
                false
            }
        }
    }

    /// Run the package's import probe through the interpreter
    pub async fn package_importable(&self, name: &str) -> bool {
        let Some(spec) = package_spec(name) else {
            warn!("No import probe known for package {name}");
            return false;
        };

        let interpreter = self.interpreter_path();
        if !interpreter.is_file() {
            return false;
        }

        match run_with_timeout(&interpreter, ["-c", spec.probe], None, self.probe_timeout).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                debug!("Probe `{}` failed: {}", spec.probe, output.stderr.trim());
                false
            }
            Err(e) => {
                warn!("Probe `{}` could not run: {}", spec.probe, e);
                false
            }
        }
    }

    /// Presence of every dependency in `kinds`, in order
    pub async fn scan(&self, kinds: &[DependencyKind]) -> Vec<(DependencyKind, bool)> {
        let mut results = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            results.push((kind, self.is_present(kind).await));
        }
        results
    }
}
