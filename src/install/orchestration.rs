//! Bootstrap pass orchestration
//!
//! One pass scans every required dependency, installs whatever is missing
//! one item at a time, and folds the outcomes into a [`BootstrapReport`].
//! A failing item never stops the pass.

use std::fmt::Write as _;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use super::catalog::{DependencyKind, required_kinds};
use super::detection::Verifier;
use super::download::{Fetcher, github};
use super::error::{Failure, FailureKind, FailureStage};
use super::installer::SlotInstaller;
use super::interpreter::InterpreterManager;
use super::platform::{DownloadSource, PlatformDescriptor, url_for};
use super::progress::{BootstrapPhase, ItemTracker, ProgressSink};
use crate::config::Settings;

/// Outcome for one dependency of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub kind: DependencyKind,
    pub was_already_present: bool,
    pub download_attempted: bool,
    pub succeeded: bool,
    pub failure: Option<Failure>,
}

impl DependencyReport {
    fn present(kind: DependencyKind) -> Self {
        Self {
            kind,
            was_already_present: true,
            download_attempted: false,
            succeeded: true,
            failure: None,
        }
    }

    fn installed(kind: DependencyKind) -> Self {
        Self {
            kind,
            was_already_present: false,
            download_attempted: true,
            succeeded: true,
            failure: None,
        }
    }

    fn failed(kind: DependencyKind, attempted: bool, failure: Failure) -> Self {
        Self {
            kind,
            was_already_present: false,
            download_attempted: attempted,
            succeeded: false,
            failure: Some(failure),
        }
    }
}

/// Ordered per-dependency results of one pass
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub items: Vec<DependencyReport>,
}

impl BootstrapReport {
    /// True iff every item that needed work succeeded
    pub fn succeeded(&self) -> bool {
        self.items
            .iter()
            .filter(|item| !item.was_already_present)
            .all(|item| item.succeeded)
    }

    pub fn already_present(&self) -> impl Iterator<Item = &DependencyReport> {
        self.items.iter().filter(|item| item.was_already_present)
    }

    /// Newly installed during this pass
    pub fn completed(&self) -> impl Iterator<Item = &DependencyReport> {
        self.items
            .iter()
            .filter(|item| !item.was_already_present && item.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DependencyReport> {
        self.items.iter().filter(|item| !item.succeeded)
    }

    pub fn downloads_attempted(&self) -> usize {
        self.items.iter().filter(|item| item.download_attempted).count()
    }

    /// Human-readable summary, grouped into completed and failed items
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if self.items.iter().all(|item| item.was_already_present) {
            out.push_str("All dependencies are present.\n");
            return out;
        }

        let completed: Vec<_> = self.completed().collect();
        if !completed.is_empty() {
            out.push_str("Completed:\n");
            for item in completed {
                let _ = writeln!(out, "  ✓ {}", item.kind.label());
            }
        }

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            out.push_str("Failed:\n");
            for item in failed {
                match &item.failure {
                    Some(failure) => {
                        let _ = writeln!(out, "  ✗ {} ({})", item.kind.label(), failure);
                    }
                    None => {
                        let _ = writeln!(out, "  ✗ {}", item.kind.label());
                    }
                }
            }
            out.push_str(
                "Features depending on failed items stay unavailable until the next bootstrap.\n",
            );
        }
        out
    }
}

/// Drives bootstrap passes over the libraries root
#[derive(Debug)]
pub struct Bootstrapper {
    settings: Settings,
    installer: SlotInstaller,
    interpreter: InterpreterManager,
    progress: ProgressSink,
}

impl Bootstrapper {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        Self::with_platform(settings, PlatformDescriptor::resolve())
    }

    pub fn with_platform(
        settings: Settings,
        platform: PlatformDescriptor,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new(&settings.timeouts)?;
        let verifier = Verifier::from_settings(&settings, platform);
        let installer = SlotInstaller::new(&settings, fetcher, verifier);
        let interpreter = InterpreterManager::new(installer.clone(), &settings);

        Ok(Self {
            settings,
            installer,
            interpreter,
            progress: ProgressSink::none(),
        })
    }

    /// Send progress events to `sink` during passes
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn verifier(&self) -> &Verifier {
        self.installer.verifier()
    }

    pub fn interpreter(&mut self) -> &mut InterpreterManager {
        &mut self.interpreter
    }

    /// Presence of every required dependency, no network
    pub async fn scan(&self) -> Vec<(DependencyKind, bool)> {
        self.verifier().scan(&required_kinds()).await
    }

    /// Run a pass and collapse it to a single verdict
    pub async fn check_and_download_all(&mut self, cancel: &CancellationToken) -> bool {
        let report = self.run(cancel).await;
        info!("{}", report.summary().trim_end());
        report.succeeded()
    }

    /// Run one bootstrap pass
    pub async fn run(&mut self, cancel: &CancellationToken) -> BootstrapReport {
        let presence = self.scan().await;
        let total = presence.iter().filter(|(_, present)| !present).count();

        if total == 0 {
            info!("All {} dependencies present", presence.len());
            return BootstrapReport {
                items: presence
                    .into_iter()
                    .map(|(kind, _)| DependencyReport::present(kind))
                    .collect(),
            };
        }

        info!("{} of {} dependencies missing", total, presence.len());

        let mut interpreter_ok = presence
            .iter()
            .any(|(kind, present)| *kind == DependencyKind::PortableInterpreter && *present);
        let mut items = Vec::with_capacity(presence.len());
        let mut index = 0;

        for (kind, present) in presence {
            if present {
                items.push(DependencyReport::present(kind));
                continue;
            }

            index += 1;
            let tracker = ItemTracker::new(self.progress.clone(), kind, index, total);

            let report = if cancel.is_cancelled() {
                DependencyReport::failed(
                    kind,
                    false,
                    Failure::new(
                        FailureStage::Download,
                        FailureKind::Canceled,
                        "bootstrap canceled",
                    ),
                )
            } else {
                match kind {
                    DependencyKind::InterpreterPackage(name) => {
                        self.install_package(kind, name, interpreter_ok, &tracker).await
                    }
                    DependencyKind::PortableInterpreter => {
                        let report = self.install_interpreter(&tracker, cancel).await;
                        interpreter_ok = report.succeeded;
                        report
                    }
                    _ => self.install_slot(kind, &tracker, cancel).await,
                }
            };

            match &report.failure {
                None => tracker.phase(BootstrapPhase::Complete),
                Some(failure) => {
                    error!("{} failed during {}: {}", kind.label(), failure.stage, failure.message);
                    tracker.phase(BootstrapPhase::Failed);
                }
            }
            items.push(report);
        }

        BootstrapReport { items }
    }

    async fn install_slot(
        &self,
        kind: DependencyKind,
        tracker: &ItemTracker,
        cancel: &CancellationToken,
    ) -> DependencyReport {
        let url = match url_for(&self.settings.sources, kind, self.verifier().platform()) {
            DownloadSource::Direct(url) => url,
            DownloadSource::ReleaseTags { api_url, archive_base } => {
                tracker.phase(BootstrapPhase::Resolving);
                let client = self.installer.fetcher().client();
                match github::latest_archive_url(client, &api_url, &archive_base).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("Release lookup for {kind} failed: {e}");
                        return DependencyReport::failed(
                            kind,
                            false,
                            Failure::new(
                                FailureStage::Lookup,
                                FailureKind::ApiLookupFailure,
                                e.to_string(),
                            ),
                        );
                    }
                }
            }
            DownloadSource::PackageManager => {
                return DependencyReport::failed(
                    kind,
                    false,
                    Failure::new(
                        FailureStage::Download,
                        FailureKind::NetworkFailure,
                        "package has no archive download",
                    ),
                );
            }
        };

        match self.installer.install(kind, &url, tracker, cancel).await {
            Ok(_) => DependencyReport::installed(kind),
            Err(failure) => DependencyReport::failed(kind, true, failure),
        }
    }

    async fn install_interpreter(
        &mut self,
        tracker: &ItemTracker,
        cancel: &CancellationToken,
    ) -> DependencyReport {
        let kind = DependencyKind::PortableInterpreter;
        match self.interpreter.ensure_runtime(tracker, cancel).await {
            Ok(()) => DependencyReport::installed(kind),
            Err(failure) => DependencyReport::failed(kind, true, failure),
        }
    }

    async fn install_package(
        &self,
        kind: DependencyKind,
        name: &str,
        interpreter_ok: bool,
        tracker: &ItemTracker,
    ) -> DependencyReport {
        if !interpreter_ok {
            return DependencyReport::failed(
                kind,
                false,
                Failure::new(
                    FailureStage::PackageInstall,
                    FailureKind::LayoutVerificationFailure,
                    "interpreter unavailable",
                ),
            );
        }

        tracker.phase(BootstrapPhase::Installing);
        if let Err(failure) = self.interpreter.install_package(name).await {
            return DependencyReport::failed(kind, true, failure);
        }

        if self.verifier().package_importable(name).await {
            DependencyReport::installed(kind)
        } else {
            DependencyReport::failed(
                kind,
                true,
                Failure::new(
                    FailureStage::Verify,
                    FailureKind::SubprocessNonZeroExit,
                    format!("{name} installed but its import probe still fails"),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::platform::{Architecture, OperatingSystem};
    use crate::install::test_support::{populate_slot, zip_bytes};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::path::Path;

    const LINUX: PlatformDescriptor =
        PlatformDescriptor::new(OperatingSystem::Linux, Architecture::X86_64);

    fn settings(app: &Path, server: &MockServer) -> Settings {
        let mut settings = Settings::for_app_dir(app);
        settings.download_dir = app.join("downloads");
        settings.sources.display_library_url = server.url("/lvgl/v9.3.0.zip");
        settings.sources.hardware_sdk_url = server.url("/nrf5_sdk_17.1.0.zip");
        settings.sources.toolchain_base_url = server.url("/arm-gnu-toolchain-13.2.rel1-");
        settings.sources.build_tool_base_url = server.url("/cmake-4.1.0-");
        settings.sources.firmware_tags_api_url =
            server.url("/repos/INFIseven/nrf52-lcd-tester-fw/tags");
        settings.sources.firmware_archive_base_url = server.url("/archive/refs/tags/");
        settings
    }

    fn lvgl_archive() -> Vec<u8> {
        zip_bytes(&[
            ("lvgl-9.3.0/lvgl.h", Some(b"".as_slice())),
            ("lvgl-9.3.0/lv_conf_template.h", Some(b"".as_slice())),
            ("lvgl-9.3.0/src/core/lv_obj.h", Some(b"".as_slice())),
            ("lvgl-9.3.0/src/core/lv_obj.c", Some(b"".as_slice())),
            ("lvgl-9.3.0/scripts/LVGLImage.py", Some(b"".as_slice())),
        ])
    }

    fn populate(root: &Path, kinds: &[DependencyKind]) {
        for &kind in kinds {
            populate_slot(root, kind, &LINUX);
        }
    }

    #[test]
    fn already_present_items_never_count_as_failures() {
        let report = BootstrapReport {
            items: vec![
                DependencyReport::present(DependencyKind::DisplayLibrary),
                DependencyReport::installed(DependencyKind::BuildTool),
            ],
        };
        assert!(report.succeeded());
        assert_eq!(report.completed().count(), 1);
        assert!(report.summary().contains("Completed:"));
        assert!(!report.summary().contains("Failed:"));
    }

    #[cfg(unix)]
    mod passes {
        use super::*;
        use crate::install::test_support::fake_interpreter;

        #[tokio::test]
        async fn second_pass_downloads_nothing() {
            let server = MockServer::start();
            let lvgl = server.mock(|when, then| {
                when.method(GET).path("/lvgl/v9.3.0.zip");
                then.status(200).body(lvgl_archive());
            });

            let dir = tempfile::tempdir().expect("tempdir");
            let settings = settings(dir.path(), &server);
            populate(
                &settings.libraries_root,
                &[
                    DependencyKind::HardwareSdk,
                    DependencyKind::CrossToolchain,
                    DependencyKind::FirmwareSource,
                    DependencyKind::BuildTool,
                ],
            );
            fake_interpreter(&settings.libraries_root, &LINUX, "exit 0");

            let mut bootstrapper =
                Bootstrapper::with_platform(settings, LINUX).expect("bootstrapper");
            let cancel = CancellationToken::new();

            let first = bootstrapper.run(&cancel).await;
            assert!(first.succeeded());
            assert_eq!(first.downloads_attempted(), 1);

            let second = bootstrapper.run(&cancel).await;
            assert!(second.succeeded());
            assert_eq!(second.downloads_attempted(), 0);
            assert!(second.items.iter().all(|item| item.was_already_present));

            assert!(bootstrapper.check_and_download_all(&cancel).await);
            lvgl.assert_calls(1);
        }

        #[tokio::test]
        async fn one_failure_among_present_and_installed_items() {
            let server = MockServer::start();
            let tags = server.mock(|when, then| {
                when.method(GET).path("/repos/INFIseven/nrf52-lcd-tester-fw/tags");
                then.status(200)
                    .json_body(json!([{"name": "v1.4.0"}, {"name": "v1.3.0"}]));
            });
            let firmware = server.mock(|when, then| {
                when.method(GET).path("/archive/refs/tags/v1.4.0.zip");
                then.status(200).body(zip_bytes(&[
                    ("nrf52-lcd-tester-fw-1.4.0/CMakeLists.txt", Some(b"project(fw)".as_slice())),
                    ("nrf52-lcd-tester-fw-1.4.0/lv_conf.h", Some(b"".as_slice())),
                    ("nrf52-lcd-tester-fw-1.4.0/src/main.c", Some(b"int main(void){}".as_slice())),
                ]));
            });
            server.mock(|when, then| {
                when.method(GET).path("/cmake-4.1.0-linux-x86_64.tar.gz");
                then.status(404);
            });

            let dir = tempfile::tempdir().expect("tempdir");
            let settings = settings(dir.path(), &server);
            let root = settings.libraries_root.clone();
            populate(
                &root,
                &[
                    DependencyKind::DisplayLibrary,
                    DependencyKind::HardwareSdk,
                    DependencyKind::CrossToolchain,
                ],
            );
            fake_interpreter(&root, &LINUX, "exit 0");

            let mut bootstrapper =
                Bootstrapper::with_platform(settings, LINUX).expect("bootstrapper");
            let report = bootstrapper.run(&CancellationToken::new()).await;

            assert!(!report.succeeded());
            let failed: Vec<_> = report.failed().collect();
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].kind, DependencyKind::BuildTool);
            assert_eq!(
                failed[0].failure.as_ref().map(|f| f.kind),
                Some(FailureKind::NetworkFailure)
            );

            tags.assert_calls(1);
            firmware.assert_calls(1);
            assert!(root.join("nrf52-lcd-tester-fw/src/main.c").is_file());
        }

        #[tokio::test]
        async fn firmware_lookup_failure_skips_the_download() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/repos/INFIseven/nrf52-lcd-tester-fw/tags");
                then.status(200).json_body(json!([]));
            });

            let dir = tempfile::tempdir().expect("tempdir");
            let settings = settings(dir.path(), &server);
            populate(
                &settings.libraries_root,
                &[
                    DependencyKind::DisplayLibrary,
                    DependencyKind::HardwareSdk,
                    DependencyKind::CrossToolchain,
                    DependencyKind::BuildTool,
                ],
            );
            fake_interpreter(&settings.libraries_root, &LINUX, "exit 0");

            let mut bootstrapper =
                Bootstrapper::with_platform(settings, LINUX).expect("bootstrapper");
            let report = bootstrapper.run(&CancellationToken::new()).await;

            let firmware = report
                .items
                .iter()
                .find(|item| item.kind == DependencyKind::FirmwareSource)
                .expect("firmware report");
            assert!(!firmware.succeeded);
            assert!(!firmware.download_attempted);
            assert_eq!(
                firmware.failure.as_ref().map(|f| f.kind),
                Some(FailureKind::ApiLookupFailure)
            );
        }

        #[tokio::test]
        async fn canceled_pass_attempts_nothing() {
            let server = MockServer::start();
            let dir = tempfile::tempdir().expect("tempdir");
            let settings = settings(dir.path(), &server);
            let mut bootstrapper =
                Bootstrapper::with_platform(settings, LINUX).expect("bootstrapper");

            let cancel = CancellationToken::new();
            cancel.cancel();
            let report = bootstrapper.run(&cancel).await;

            assert!(!report.succeeded());
            assert_eq!(report.downloads_attempted(), 0);
            assert!(report
                .failed()
                .all(|item| item.failure.as_ref().map(|f| f.kind) == Some(FailureKind::Canceled)));
        }

        #[tokio::test]
        async fn packages_fail_without_attempt_when_interpreter_is_missing() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/cpython-3.11.9-install_only.tar.gz");
                then.status(503);
            });

            let dir = tempfile::tempdir().expect("tempdir");
            let mut settings = settings(dir.path(), &server);
            settings.sources.interpreter_linux_url =
                server.url("/cpython-3.11.9-install_only.tar.gz");
            populate(
                &settings.libraries_root,
                &[
                    DependencyKind::DisplayLibrary,
                    DependencyKind::HardwareSdk,
                    DependencyKind::CrossToolchain,
                    DependencyKind::FirmwareSource,
                    DependencyKind::BuildTool,
                ],
            );

            let mut bootstrapper =
                Bootstrapper::with_platform(settings, LINUX).expect("bootstrapper");
            let report = bootstrapper.run(&CancellationToken::new()).await;

            let packages: Vec<_> = report
                .items
                .iter()
                .filter(|item| matches!(item.kind, DependencyKind::InterpreterPackage(_)))
                .collect();
            assert_eq!(packages.len(), 4);
            assert!(packages.iter().all(|p| !p.succeeded && !p.download_attempted));
            assert_eq!(report.failed().count(), 5);
        }
    }
}
