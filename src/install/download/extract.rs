//! Archive extraction into canonical slot directories
//!
//! Archives are always unpacked into a short-lived scratch directory first.
//! Only once decompression succeeded is the slot directory replaced, so a
//! failed extraction leaves the previous slot contents untouched. The
//! archive file is deleted whatever the outcome.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use tar::Archive;
use walkdir::WalkDir;

use crate::install::error::ExtractError;
use crate::install::process::run_with_timeout;

/// Archive container formats found among the dependency downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    TarXz,
}

impl ArchiveKind {
    /// Infer the format from a download URL's suffix
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if path.ends_with(".tar.xz") {
            Some(ArchiveKind::TarXz)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => ".zip",
            ArchiveKind::TarGz => ".tar.gz",
            ArchiveKind::TarXz => ".tar.xz",
        }
    }
}

/// Everything needed to turn one archive into one slot directory
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    pub archive: &'a Path,
    pub kind: ArchiveKind,
    pub dest_root: &'a Path,
    pub slot: &'a str,
    /// A single top-level entry starting with one of these becomes the slot
    pub prefixes: &'a [&'a str],
    /// Parent of the scratch directory; keep it short
    pub scratch_base: &'a Path,
    /// Limit for the external `tar` tool
    pub tool_timeout: Duration,
}

/// Extract `request.archive` into `dest_root/slot`, returning the slot path
pub async fn extract(request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractError> {
    let result = extract_via_scratch(request).await;

    match tokio::fs::remove_file(request.archive).await {
        Ok(()) => debug!("Removed archive {}", request.archive.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove archive {}: {}", request.archive.display(), e),
    }

    match &result {
        Ok(slot) => info!("Extracted {} into {}", request.archive.display(), slot.display()),
        Err(e) => warn!("Extraction of {} failed: {}", request.archive.display(), e),
    }
    result
}

async fn extract_via_scratch(request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractError> {
    fs::create_dir_all(request.scratch_base).map_err(|e| {
        ExtractError::Decompression(format!(
            "cannot create scratch base {}: {}",
            request.scratch_base.display(),
            e
        ))
    })?;
    let scratch = tempfile::Builder::new()
        .prefix("lcdx")
        .tempdir_in(request.scratch_base)
        .map_err(|e| ExtractError::Decompression(format!("cannot create scratch directory: {e}")))?;

    decompress(request.archive, request.kind, scratch.path(), request.tool_timeout).await?;

    let scratch_path = scratch.path().to_path_buf();
    let dest = request.dest_root.join(request.slot);
    let prefixes: Vec<String> = request.prefixes.iter().map(|p| p.to_string()).collect();
    let dest_clone = dest.clone();

    // Directory shuffling is blocking filesystem work
    tokio::task::spawn_blocking(move || promote(&scratch_path, &prefixes, &dest_clone))
        .await
        .map_err(|e| ExtractError::Move {
            from: scratch.path().to_path_buf(),
            to: dest.clone(),
            message: e.to_string(),
        })??;

    if let Err(e) = scratch.close() {
        warn!("Failed to remove scratch directory: {e}");
    }

    Ok(dest)
}

/// Unpack `archive` into `target` with the routine matching `kind`
async fn decompress(
    archive: &Path,
    kind: ArchiveKind,
    target: &Path,
    tool_timeout: Duration,
) -> Result<(), ExtractError> {
    match kind {
        ArchiveKind::Zip => {
            let archive = archive.to_path_buf();
            let target = target.to_path_buf();
            tokio::task::spawn_blocking(move || unpack_zip(&archive, &target))
                .await
                .map_err(|e| ExtractError::Decompression(e.to_string()))?
        }
        ArchiveKind::TarGz => {
            let archive = archive.to_path_buf();
            let target = target.to_path_buf();
            tokio::task::spawn_blocking(move || unpack_tar_gz(&archive, &target))
                .await
                .map_err(|e| ExtractError::Decompression(e.to_string()))?
        }
        ArchiveKind::TarXz => unpack_with_tar_tool(archive, target, tool_timeout).await,
    }
}

fn unpack_zip(archive_path: &Path, target: &Path) -> Result<(), ExtractError> {
    let decompression = |e: &dyn std::fmt::Display| {
        ExtractError::Decompression(format!("{}: {}", archive_path.display(), e))
    };

    let file = File::open(archive_path).map_err(|e| decompression(&e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| decompression(&e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| decompression(&e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| decompression(&e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| decompression(&e))?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| decompression(&e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| decompression(&e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                    .map_err(|e| decompression(&e))?;
            }
        }
    }

    Ok(())
}

fn unpack_tar_gz(archive_path: &Path, target: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)
        .map_err(|e| ExtractError::Decompression(format!("{}: {}", archive_path.display(), e)))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive
        .unpack(target)
        .map_err(|e| ExtractError::Decompression(format!("{}: {}", archive_path.display(), e)))
}

/// `.tar.xz` goes through the system `tar`, which handles xz on every platform
async fn unpack_with_tar_tool(
    archive: &Path,
    target: &Path,
    limit: Duration,
) -> Result<(), ExtractError> {
    let args: [&OsStr; 4] = [
        "-xJf".as_ref(),
        archive.as_os_str(),
        "-C".as_ref(),
        target.as_os_str(),
    ];
    let output = run_with_timeout(Path::new("tar"), args, None, limit)
        .await
        .map_err(|e| ExtractError::Decompression(e.to_string()))?;

    debug!("tar stdout: {}", output.stdout);
    debug!("tar stderr: {}", output.stderr);

    // Exit status alone is not trusted
    if !output.success() || output.reports_errors() {
        return Err(ExtractError::Decompression(format!(
            "tar exited with {:?}: {}",
            output.code,
            output.stderr.trim()
        )));
    }
    Ok(())
}

/// Move the extracted tree from `scratch` into `dest`, replacing it.
///
/// A single top-level directory matching a prefix becomes the slot; with no
/// match the scratch contents are promoted as-is. Files never count as a
/// prefix match, so flat archives like the embeddable interpreter stay flat.
fn promote(scratch: &Path, prefixes: &[String], dest: &Path) -> Result<(), ExtractError> {
    let entries = top_level_entries(scratch).map_err(|e| ExtractError::Move {
        from: scratch.to_path_buf(),
        to: dest.to_path_buf(),
        message: e.to_string(),
    })?;
    let matching: Vec<&PathBuf> = entries
        .iter()
        .filter(|path| path.is_dir() && matches_prefix(path, prefixes))
        .collect();

    match matching.as_slice() {
        [single] => {
            // Never replace a good slot with nothing
            if !has_entries(single) {
                return Err(ExtractError::Verification(dest.to_path_buf()));
            }
            replace_slot(dest, |staging| move_tree(single, staging))
        }
        [] => {
            debug!("No prefixed top-level directory, promoting scratch contents as-is");
            if entries.is_empty() {
                return Err(ExtractError::Verification(dest.to_path_buf()));
            }
            replace_slot(dest, |staging| {
                fs::create_dir_all(staging)?;
                for entry in &entries {
                    let Some(name) = entry.file_name() else { continue };
                    move_tree(entry, &staging.join(name))?;
                }
                Ok(())
            })
        }
        _ => Err(ExtractError::Move {
            from: scratch.to_path_buf(),
            to: dest.to_path_buf(),
            message: format!("{} top-level entries match {:?}", matching.len(), prefixes),
        }),
    }
}

fn matches_prefix(path: &Path, prefixes: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
}

/// Sibling of `dest` where the new slot is assembled before the swap
fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slot".to_string());
    dest.with_file_name(format!(".{name}.new"))
}

/// Fill a staging directory with `fill`, then swap it in for `dest`.
///
/// The old slot is only removed once the staging tree is complete, and a
/// failed fill removes the staging directory, so `dest` is never left half
/// populated.
fn replace_slot<F>(dest: &Path, fill: F) -> Result<(), ExtractError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let staging = staging_path(dest);
    let move_error = |message: String| ExtractError::Move {
        from: staging.clone(),
        to: dest.to_path_buf(),
        message,
    };

    if staging.exists() {
        fs::remove_dir_all(&staging)
            .map_err(|e| move_error(format!("cannot clear stale staging directory: {e}")))?;
    }
    if let Some(parent) = staging.parent() {
        fs::create_dir_all(parent).map_err(|e| move_error(e.to_string()))?;
    }

    let staged = match fill(&staging) {
        Ok(()) if has_entries(&staging) => Ok(()),
        Ok(()) => Err(ExtractError::Verification(dest.to_path_buf())),
        Err(e) => Err(move_error(e.to_string())),
    };
    if let Err(e) = staged {
        discard(&staging);
        return Err(e);
    }

    if dest.exists()
        && let Err(e) = fs::remove_dir_all(dest)
    {
        discard(&staging);
        return Err(move_error(format!("cannot remove old slot: {e}")));
    }
    if let Err(e) = fs::rename(&staging, dest) {
        discard(&staging);
        return Err(move_error(e.to_string()));
    }

    if !has_entries(dest) {
        return Err(ExtractError::Verification(dest.to_path_buf()));
    }
    Ok(())
}

fn discard(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!("Failed to remove staging directory {}: {}", staging.display(), e);
    }
}

fn top_level_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut d| d.next().is_some())
        .unwrap_or(false)
}

/// Rename, falling back to copy + delete when crossing filesystems
fn move_tree(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("rename {} -> {} failed ({}), copying", from.display(), to.display(), e);
            copy_tree(from, to)?;
            if from.is_dir() {
                fs::remove_dir_all(from)
            } else {
                fs::remove_file(from)
            }
        }
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::catalog::DependencyKind;
    use crate::install::test_support::{write_tar_gz, write_zip};

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        scratch: PathBuf,
        downloads: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("libraries");
        let scratch = dir.path().join("scratch");
        let downloads = dir.path().join("downloads");
        fs::create_dir_all(&root).expect("root");
        fs::create_dir_all(&downloads).expect("downloads");
        Fixture { _dir: dir, root, scratch, downloads }
    }

    fn request<'a>(
        fx: &'a Fixture,
        archive: &'a Path,
        kind: ArchiveKind,
        slot: &'a str,
        prefixes: &'a [&'a str],
    ) -> ExtractRequest<'a> {
        ExtractRequest {
            archive,
            kind,
            dest_root: &fx.root,
            slot,
            prefixes,
            scratch_base: &fx.scratch,
            tool_timeout: Duration::from_secs(60),
        }
    }

    fn scratch_is_clean(fx: &Fixture) -> bool {
        !has_entries(&fx.scratch)
    }

    #[test]
    fn archive_kind_from_url_suffix() {
        assert_eq!(ArchiveKind::from_url("https://x/lvgl/v9.3.0.zip"), Some(ArchiveKind::Zip));
        assert_eq!(
            ArchiveKind::from_url("https://x/cmake-linux-x86_64.tar.gz"),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(ArchiveKind::from_url("https://x/arm.tar.xz?rev=1"), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::from_url("https://x/get-pip.py"), None);
    }

    #[tokio::test]
    async fn prefixed_entry_becomes_the_slot() {
        let fx = fixture();
        let archive = fx.downloads.join("lvgl.zip");
        write_zip(
            &archive,
            &[
                ("lvgl-9.3.0/", None),
                ("lvgl-9.3.0/lvgl.h", Some(b"#pragma once".as_slice())),
                ("lvgl-9.3.0/src/core/lv_obj.h", Some(b"".as_slice())),
            ],
        );

        let slot = extract(&request(&fx, &archive, ArchiveKind::Zip, "lvgl", &["lvgl-"]))
            .await
            .expect("extraction should succeed");

        assert_eq!(slot, fx.root.join("lvgl"));
        assert!(slot.join("lvgl.h").is_file());
        assert!(slot.join("src/core/lv_obj.h").is_file());
        assert!(!archive.exists());
        assert!(scratch_is_clean(&fx));
    }

    #[tokio::test]
    async fn tar_gz_replaces_existing_slot_without_merging() {
        let fx = fixture();
        let stale = fx.root.join("cmake/stale.txt");
        fs::create_dir_all(stale.parent().expect("parent")).expect("mkdir");
        fs::write(&stale, "old").expect("write stale");

        let archive = fx.downloads.join("cmake.tar.gz");
        write_tar_gz(
            &archive,
            &[("cmake-4.1.0-linux-x86_64/bin/cmake", b"#!/bin/sh\n".as_slice())],
        );

        let slot = extract(&request(&fx, &archive, ArchiveKind::TarGz, "cmake", &["cmake-"]))
            .await
            .expect("extraction should succeed");

        assert!(slot.join("bin/cmake").is_file());
        assert!(!stale.exists());
        assert!(!archive.exists());
        assert!(scratch_is_clean(&fx));
    }

    #[tokio::test]
    async fn flat_interpreter_archive_is_promoted_as_is() {
        let fx = fixture();
        let archive = fx.downloads.join("python-3.11.9-embed-amd64.zip");
        write_zip(
            &archive,
            &[
                ("python.exe", Some(b"MZ".as_slice())),
                ("pythonw.exe", Some(b"MZ".as_slice())),
                ("python3.dll", Some(b"".as_slice())),
                ("python311.dll", Some(b"".as_slice())),
                ("python311.zip", Some(b"".as_slice())),
                ("python311._pth", Some(b"python311.zip\n.\n#import site\n".as_slice())),
                ("vcruntime140.dll", Some(b"".as_slice())),
            ],
        );
        let spec = DependencyKind::PortableInterpreter
            .slot_spec()
            .expect("interpreter has a slot");

        let slot = extract(&request(&fx, &archive, ArchiveKind::Zip, spec.slot, spec.prefixes))
            .await
            .expect("extraction should succeed");

        assert_eq!(slot, fx.root.join("python"));
        assert!(slot.join("python.exe").is_file());
        assert!(slot.join("python311._pth").is_file());
        assert!(slot.join("vcruntime140.dll").is_file());
        assert!(scratch_is_clean(&fx));
    }

    #[tokio::test]
    async fn standalone_interpreter_directory_becomes_the_slot() {
        let fx = fixture();
        let archive = fx.downloads.join("cpython-3.11.9-x86_64-unknown-linux-gnu.tar.gz");
        write_tar_gz(&archive, &[("python/bin/python3", b"#!/bin/sh\n".as_slice())]);
        let spec = DependencyKind::PortableInterpreter
            .slot_spec()
            .expect("interpreter has a slot");

        let slot = extract(&request(&fx, &archive, ArchiveKind::TarGz, spec.slot, spec.prefixes))
            .await
            .expect("extraction should succeed");

        assert!(slot.join("bin/python3").is_file());
        assert!(!slot.join("python").exists());
    }

    #[tokio::test]
    async fn empty_result_fails_and_keeps_old_slot() {
        let fx = fixture();
        let keep = fx.root.join("cmake/bin/cmake");
        fs::create_dir_all(keep.parent().expect("parent")).expect("mkdir");
        fs::write(&keep, "good").expect("write");

        let archive = fx.downloads.join("cmake.zip");
        write_zip(&archive, &[("cmake-4.1.0-windows-x86_64/", None)]);

        let result = extract(&request(&fx, &archive, ArchiveKind::Zip, "cmake", &["cmake-"])).await;

        assert!(matches!(result, Err(ExtractError::Verification(_))));
        assert!(keep.is_file());
        assert!(!archive.exists());
        assert!(scratch_is_clean(&fx));
    }

    #[tokio::test]
    async fn corrupt_archive_is_a_decompression_error() {
        let fx = fixture();
        let archive = fx.downloads.join("broken.zip");
        fs::write(&archive, b"this is not a zip").expect("write");

        let result = extract(&request(&fx, &archive, ArchiveKind::Zip, "lvgl", &["lvgl-"])).await;

        assert!(matches!(result, Err(ExtractError::Decompression(_))));
        assert!(!archive.exists());
        assert!(!fx.root.join("lvgl").exists());
        assert!(scratch_is_clean(&fx));
    }

    #[tokio::test]
    async fn ambiguous_top_level_is_refused() {
        let fx = fixture();
        let archive = fx.downloads.join("sdk.zip");
        write_zip(
            &archive,
            &[
                ("nRF5_SDK_17.1.0/a.h", Some(b"".as_slice())),
                ("nrf5_sdk_17.0.2/b.h", Some(b"".as_slice())),
            ],
        );

        let prefixes = ["nRF5_SDK_", "nrf5_sdk_"];
        let sdk = request(&fx, &archive, ArchiveKind::Zip, "nrf5_sdk", &prefixes);
        let result = extract(&sdk).await;

        assert!(matches!(result, Err(ExtractError::Move { .. })));
        assert!(!fx.root.join("nrf5_sdk").exists());
    }

    #[test]
    fn failed_fill_keeps_old_slot_and_removes_staging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("cmake");
        fs::create_dir_all(dest.join("bin")).expect("mkdir");
        fs::write(dest.join("bin/cmake"), "good").expect("write");

        let result = replace_slot(&dest, |staging| {
            fs::create_dir_all(staging)?;
            fs::write(staging.join("first"), "moved")?;
            move_tree(&dir.path().join("vanished"), &staging.join("second"))
        });

        assert!(matches!(result, Err(ExtractError::Move { .. })));
        assert_eq!(fs::read_to_string(dest.join("bin/cmake")).expect("read"), "good");
        assert!(!dest.join("first").exists());
        assert!(!staging_path(&dest).exists());
    }

    #[test]
    fn stale_staging_directory_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("lvgl");
        let staging = staging_path(&dest);
        fs::create_dir_all(&staging).expect("mkdir");
        fs::write(staging.join("leftover"), "old").expect("write");

        replace_slot(&dest, |staging| {
            fs::create_dir_all(staging)?;
            fs::write(staging.join("lvgl.h"), "")
        })
        .expect("swap should succeed");

        assert!(dest.join("lvgl.h").is_file());
        assert!(!dest.join("leftover").exists());
        assert!(!staging.exists());
    }

    #[cfg(unix)]
    fn write_tar_xz(archive: &Path, top: &str, files: &[&str]) {
        let src = archive.with_extension("src");
        for file in files {
            let path = src.join(top).join(file);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, "").expect("write");
        }
        let status = std::process::Command::new("tar")
            .arg("-cJf")
            .arg(archive)
            .arg("-C")
            .arg(&src)
            .arg(top)
            .status()
            .expect("run tar");
        assert!(status.success(), "tar -cJf failed");
        fs::remove_dir_all(&src).expect("cleanup");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tar_xz_goes_through_the_system_tar() {
        let fx = fixture();
        let archive = fx.downloads.join("arm.tar.xz");
        write_tar_xz(
            &archive,
            "arm-gnu-toolchain-13.2.Rel1-x86_64-arm-none-eabi",
            &["bin/arm-none-eabi-gcc", "lib/gcc/arm-none-eabi/13.2.1/crtbegin.o"],
        );

        let prefixes = ["arm-gnu-toolchain-"];
        let toolchain = request(&fx, &archive, ArchiveKind::TarXz, "arm-gnu-toolchain", &prefixes);
        let slot = extract(&toolchain)
            .await
            .expect("extraction should succeed");

        assert!(slot.join("bin/arm-none-eabi-gcc").is_file());
        assert!(slot.join("lib/gcc/arm-none-eabi/13.2.1/crtbegin.o").is_file());
        assert!(!archive.exists());
        assert!(scratch_is_clean(&fx));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn corrupt_tar_xz_is_a_decompression_error() {
        let fx = fixture();
        let archive = fx.downloads.join("arm.tar.xz");
        fs::write(&archive, b"\xfd7zXZ\0 truncated").expect("write");

        let prefixes = ["arm-gnu-toolchain-"];
        let toolchain = request(&fx, &archive, ArchiveKind::TarXz, "arm-gnu-toolchain", &prefixes);
        let result = extract(&toolchain).await;

        assert!(matches!(result, Err(ExtractError::Decompression(_))));
        assert!(!archive.exists());
        assert!(!fx.root.join("arm-gnu-toolchain").exists());
        assert!(scratch_is_clean(&fx));
    }

    #[test]
    fn copy_fallback_moves_nested_trees() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("from");
        fs::create_dir_all(from.join("a/b")).expect("mkdir");
        fs::write(from.join("a/b/c.txt"), "c").expect("write");

        let to = dir.path().join("to");
        copy_tree(&from, &to).expect("copy");
        assert_eq!(fs::read_to_string(to.join("a/b/c.txt")).expect("read"), "c");
    }
}
