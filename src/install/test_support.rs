//! Fixture builders shared by the install tests

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use super::catalog::DependencyKind;
use super::platform::PlatformDescriptor;

/// Write a zip archive; `None` content means a directory entry
pub fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
    let file = File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for (name, content) in entries {
        match content {
            Some(bytes) => {
                zip.start_file(*name, options).expect("start zip entry");
                zip.write_all(bytes).expect("write zip entry");
            }
            None => zip.add_directory(*name, options).expect("add zip directory"),
        }
    }
    zip.finish().expect("finish zip");
}

/// In-memory zip, for serving from a mock HTTP server
pub fn zip_bytes(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fixture.zip");
    write_zip(&path, entries);
    fs::read(&path).expect("read zip")
}

pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create tar.gz");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for (name, bytes) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *bytes).expect("append tar entry");
    }

    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

/// Create every marker file of `kind` under `root`
pub fn populate_slot(root: &Path, kind: DependencyKind, platform: &PlatformDescriptor) -> PathBuf {
    let spec = kind.slot_spec().expect("slot kind");
    let slot = root.join(spec.slot);
    for marker in spec.markers {
        let mut relative = marker.path.to_string();
        if marker.executable {
            relative.push_str(platform.executable_suffix());
        }
        let path = slot.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create marker parent");
        }
        fs::write(&path, b"marker").expect("write marker");
    }
    slot
}

/// Install an executable shell script standing in for the interpreter
#[cfg(unix)]
pub fn fake_interpreter(root: &Path, platform: &PlatformDescriptor, body: &str) -> PathBuf {
    let relative = platform.capabilities().interpreter_executable;
    let path = root.join("python").join(relative);
    write_script(&path, body);
    path
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create script parent");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}
