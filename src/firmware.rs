//! Firmware configure/build and flashing

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};

use crate::config::Settings;
use crate::install::{OperatingSystem, PlatformDescriptor, ToolOutput, run_with_timeout};

/// Hex image produced by the configure script
pub const HEX_FILE: &str = "nrf52-lcd-tester-fw.hex";

#[derive(Debug, Clone)]
pub struct FirmwareBuilder {
    build_dir: PathBuf,
    platform: PlatformDescriptor,
    build_timeout: Duration,
    flash_timeout: Duration,
}

impl FirmwareBuilder {
    pub fn new(settings: &Settings, platform: PlatformDescriptor) -> Self {
        Self {
            build_dir: settings.build_dir.clone(),
            platform,
            build_timeout: settings.timeouts.firmware_build(),
            flash_timeout: settings.timeouts.flash(),
        }
    }

    pub fn hex_path(&self) -> PathBuf {
        self.build_dir.join(HEX_FILE)
    }

    /// Script name and the program/arguments that run it
    fn configure_command(&self) -> (&'static str, PathBuf, Vec<&'static str>) {
        match self.platform.os {
            OperatingSystem::Windows => {
                ("configure.bat", PathBuf::from("cmd.exe"), vec!["/c", "configure.bat"])
            }
            _ => ("configure.sh", PathBuf::from("/bin/bash"), vec!["configure.sh"]),
        }
    }

    /// Run the configure script, which also builds the firmware
    pub async fn configure_and_build(&self) -> Result<()> {
        if !self.build_dir.is_dir() {
            bail!("Build directory {} does not exist", self.build_dir.display());
        }

        let (script, program, args) = self.configure_command();
        if !self.build_dir.join(script).is_file() {
            bail!("Configure script {} not found", self.build_dir.join(script).display());
        }

        info!("Configuring and building firmware in {}", self.build_dir.display());
        let output = run_with_timeout(&program, args, Some(&self.build_dir), self.build_timeout)
            .await
            .with_context(|| format!("Failed to run {script}"))?;
        report(script, &output)
    }

    /// Flash the built hex image with `nrfjprog`
    pub async fn flash(&self) -> Result<()> {
        let hex = self.hex_path();
        if !hex.is_file() {
            bail!("Firmware image {} not found; build first", hex.display());
        }

        info!("Flashing {}", hex.display());
        let args: [&OsStr; 5] = [
            "--program".as_ref(),
            hex.as_os_str(),
            "--chiperase".as_ref(),
            "--reset".as_ref(),
            "--verify".as_ref(),
        ];
        let output = run_with_timeout(Path::new("nrfjprog"), args, None, self.flash_timeout)
            .await
            .context("Failed to run nrfjprog; make sure it is installed and in PATH")?;
        report("nrfjprog", &output)
    }

    pub async fn build_and_flash(&self) -> Result<()> {
        self.configure_and_build().await?;
        self.flash().await
    }
}

fn report(program: &str, output: &ToolOutput) -> Result<()> {
    debug!("{program} stdout: {}", output.stdout);
    if !output.stderr.trim().is_empty() {
        warn!("{program} stderr: {}", output.stderr.trim());
    }
    if !output.success() {
        bail!("{program} exited with {:?}", output.code);
    }
    Ok(())
}
