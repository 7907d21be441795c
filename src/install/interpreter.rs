//! Portable Python runtime management
//!
//! Setup walks a fixed sequence of stages:
//! `NotPresent -> Downloading -> Extracting -> PackageManagerBootstrap
//! (Windows only) -> InstallingPackages -> Verified`.
//! A failing stage halts the sequence where it is. Nothing is rolled back;
//! the next presence scan sees whatever was left on disk.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use super::catalog::{DependencyKind, REQUIRED_PACKAGES};
use super::error::{Failure, FailureKind, FailureStage, ProcessError};
use super::installer::SlotInstaller;
use super::platform::{DownloadSource, PlatformCapabilities, url_for};
use super::process::{ToolOutput, run_with_timeout};
use super::progress::{BootstrapPhase, ItemTracker};
use crate::config::{Settings, Sources, Timeouts};

/// Stage reached by the last [`InterpreterManager::setup`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    NotPresent,
    Downloading,
    Extracting,
    PackageManagerBootstrap,
    InstallingPackages,
    Verified,
}

#[derive(Debug, Clone)]
pub struct InterpreterManager {
    installer: SlotInstaller,
    capabilities: PlatformCapabilities,
    sources: Sources,
    timeouts: Timeouts,
    stage: SetupStage,
    last_failure: Option<Failure>,
}

impl InterpreterManager {
    pub fn new(installer: SlotInstaller, settings: &Settings) -> Self {
        let capabilities = installer.verifier().platform().capabilities();
        Self {
            installer,
            capabilities,
            sources: settings.sources.clone(),
            timeouts: settings.timeouts.clone(),
            stage: SetupStage::NotPresent,
            last_failure: None,
        }
    }

    pub fn stage(&self) -> SetupStage {
        self.stage
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    pub fn interpreter_path(&self) -> PathBuf {
        self.installer.verifier().interpreter_path()
    }

    fn slot_dir(&self) -> PathBuf {
        self.installer
            .verifier()
            .libraries_root()
            .join("python")
    }

    pub async fn is_healthy(&self) -> bool {
        self.installer
            .verifier()
            .is_present(DependencyKind::PortableInterpreter)
            .await
    }

    /// Full setup: runtime, package manager, every required package.
    ///
    /// A no-op when the runtime and all packages already verify.
    pub async fn setup(&mut self, cancel: &CancellationToken) -> bool {
        self.last_failure = None;
        match self.try_setup(cancel).await {
            Ok(()) => true,
            Err(failure) => {
                error!("Interpreter setup halted at {:?}: {}", self.stage, failure);
                self.last_failure = Some(failure);
                false
            }
        }
    }

    async fn try_setup(&mut self, cancel: &CancellationToken) -> Result<(), Failure> {
        let tracker = ItemTracker::detached(DependencyKind::PortableInterpreter);
        self.ensure_runtime(&tracker, cancel).await?;

        self.stage = SetupStage::InstallingPackages;
        let verifier = self.installer.verifier().clone();
        for package in REQUIRED_PACKAGES {
            if verifier.package_importable(package.name).await {
                debug!("Package {} already importable", package.name);
                continue;
            }
            self.install_package(package.name).await?;
            if !verifier.package_importable(package.name).await {
                return Err(Failure::new(
                    FailureStage::Verify,
                    FailureKind::SubprocessNonZeroExit,
                    format!("`{}` still fails after installing {}", package.probe, package.name),
                ));
            }
        }

        self.stage = SetupStage::Verified;
        Ok(())
    }

    /// Make sure a healthy runtime (with a package manager) sits in the slot
    pub async fn ensure_runtime(
        &mut self,
        tracker: &ItemTracker,
        cancel: &CancellationToken,
    ) -> Result<(), Failure> {
        if self.is_healthy().await {
            debug!("Interpreter at {} is healthy", self.interpreter_path().display());
            return Ok(());
        }

        let url = match url_for(
            &self.sources,
            DependencyKind::PortableInterpreter,
            self.installer.verifier().platform(),
        ) {
            DownloadSource::Direct(url) => url,
            other => {
                return Err(Failure::new(
                    FailureStage::Download,
                    FailureKind::NetworkFailure,
                    format!("interpreter has no direct download: {other:?}"),
                ));
            }
        };

        self.stage = SetupStage::Downloading;
        let (archive, archive_kind) = self
            .installer
            .download(DependencyKind::PortableInterpreter, &url, tracker, cancel)
            .await?;

        self.stage = SetupStage::Extracting;
        self.installer
            .unpack(DependencyKind::PortableInterpreter, archive, archive_kind, tracker)
            .await?;

        if self.capabilities.needs_package_manager_bootstrap {
            self.stage = SetupStage::PackageManagerBootstrap;
            tracker.phase(BootstrapPhase::Installing);
            self.bootstrap_package_manager(cancel).await?;
        }

        if !self.is_healthy().await {
            return Err(Failure::new(
                FailureStage::Verify,
                FailureKind::LayoutVerificationFailure,
                format!("{} failed its version probe", self.interpreter_path().display()),
            ));
        }

        info!("Interpreter ready at {}", self.interpreter_path().display());
        Ok(())
    }

    /// Enable site imports and run `get-pip.py` through the fresh runtime
    async fn bootstrap_package_manager(&self, cancel: &CancellationToken) -> Result<(), Failure> {
        let slot = self.slot_dir();
        enable_site_imports(&slot).map_err(|e| {
            Failure::new(
                FailureStage::PackageManagerBootstrap,
                FailureKind::WriteFailure,
                format!("cannot edit ._pth file: {e}"),
            )
        })?;

        let script = slot.join("get-pip.py");
        self.installer
            .fetcher()
            .download(
                &self.sources.package_manager_bootstrap_url,
                &script,
                DependencyKind::PortableInterpreter,
                |_, _| {},
                cancel,
            )
            .await
            .map_err(|e| {
                Failure::new(FailureStage::PackageManagerBootstrap, e.kind(), e.to_string())
            })?;

        let mut args = vec![script.into_os_string()];
        if self.capabilities.user_package_install {
            args.push("--user".into());
        }

        info!("Bootstrapping pip");
        run_with_timeout(
            &self.interpreter_path(),
            args,
            Some(&slot),
            self.timeouts.package_manager_bootstrap(),
        )
        .await
        .and_then(|output| checked(output, "get-pip.py"))
        .map(|_| ())
        .map_err(|e| Failure::new(FailureStage::PackageManagerBootstrap, e.kind(), e.to_string()))
    }

    /// `python -m pip install [--user] <name>`
    pub async fn install_package(&self, name: &str) -> Result<(), Failure> {
        let mut args = vec!["-m", "pip", "install"];
        if self.capabilities.user_package_install {
            args.push("--user");
        }
        args.push(name);

        info!("Installing package {name}");
        run_with_timeout(&self.interpreter_path(), &args, None, self.timeouts.package_install())
            .await
            .and_then(|output| checked(output, "pip install"))
            .map(|output| debug!("pip output for {name}: {}", output.stdout.trim()))
            .map_err(|e| Failure::new(FailureStage::PackageInstall, e.kind(), e.to_string()))
    }

    /// Run `script` with `args` through the interpreter.
    ///
    /// Any exit code is returned as-is; only spawn failures and timeouts are
    /// errors.
    pub async fn run_script<I, S>(&self, script: &Path, args: I) -> Result<ToolOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut full_args = vec![script.as_os_str().to_os_string()];
        full_args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));

        let output =
            run_with_timeout(&self.interpreter_path(), full_args, None, self.timeouts.script())
                .await?;
        debug!(
            "{} exited with {:?}\nstdout: {}\nstderr: {}",
            script.display(),
            output.code,
            output.stdout,
            output.stderr
        );
        Ok(output)
    }
}

/// Non-zero exit becomes an error, with both streams logged
fn checked(output: ToolOutput, program: &str) -> Result<ToolOutput, ProcessError> {
    if !output.success() {
        warn!(
            "{program} failed with {:?}\nstdout: {}\nstderr: {}",
            output.code,
            output.stdout.trim(),
            output.stderr.trim()
        );
    }
    output.into_result(program)
}

/// Uncomment `import site` in every `._pth` file of the slot
fn enable_site_imports(slot: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(slot)? {
        let path = entry?.path();
        let is_pth = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("._pth"));
        if !is_pth {
            continue;
        }

        let content = fs::read_to_string(&path)?;
        fs::write(&path, with_site_import(&content))?;
        debug!("Enabled site imports in {}", path.display());
    }
    Ok(())
}

fn with_site_import(content: &str) -> String {
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line.trim() == "#import site" {
                "import site".to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !lines.iter().any(|l| l.trim() == "import site") {
        lines.push("import site".to_string());
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}
