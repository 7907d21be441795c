//! Image to C source conversion
//!
//! Each image goes through LVGL's `LVGLImage.py` inside the portable
//! interpreter, producing `<name>.c` in the output directory. The converted
//! descriptors are then collected into `generated_images.h` and
//! `generated_images.c` for the firmware build.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::install::{DependencyKind, InterpreterManager, Verifier};

/// Image conversion script, relative to the LVGL slot
const SCRIPT_PATH: &str = "scripts/LVGLImage.py";

/// One successfully converted image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedImage {
    pub source: PathBuf,
    /// C identifier of the image descriptor
    pub name: String,
    pub output: PathBuf,
}

/// Turn a file's base name into a C identifier
///
/// The base name stops at the first `.`; every character outside
/// `[A-Za-z0-9_]` becomes `_`.
pub fn sanitize_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();

    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Location of the conversion script inside the libraries root
pub fn script_path(verifier: &Verifier) -> Option<PathBuf> {
    verifier
        .slot_dir(DependencyKind::DisplayLibrary)
        .map(|slot| slot.join(SCRIPT_PATH))
}

/// Convert every image in `images` into `output_dir`.
///
/// A failing image is logged and skipped; the call only fails when nothing
/// converted.
pub async fn convert_images(
    interpreter: &InterpreterManager,
    script: &Path,
    images: &[PathBuf],
    output_dir: &Path,
) -> Result<Vec<ConvertedImage>> {
    if images.is_empty() {
        bail!("No images given");
    }
    if !script.is_file() {
        bail!(
            "LVGL image script not found at {}; run the bootstrap first",
            script.display()
        );
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let output_dir = fs::canonicalize(output_dir)
        .with_context(|| format!("Failed to resolve {}", output_dir.display()))?;

    let mut converted = Vec::new();
    for (i, image) in images.iter().enumerate() {
        let name = sanitize_name(image);
        info!("Processing {} ({} of {})", image.display(), i + 1, images.len());

        let args: [&OsStr; 9] = [
            image.as_os_str(),
            "--output".as_ref(),
            output_dir.as_os_str(),
            "--ofmt".as_ref(),
            "C".as_ref(),
            "--cf".as_ref(),
            "RGB565".as_ref(),
            "--name".as_ref(),
            name.as_ref(),
        ];

        match interpreter.run_script(script, args).await {
            Ok(output) if output.success() => {
                converted.push(ConvertedImage {
                    source: image.clone(),
                    output: output_dir.join(format!("{name}.c")),
                    name,
                });
            }
            Ok(output) => warn!(
                "Failed to process {} (exit {:?}): {}",
                image.display(),
                output.code,
                if output.stderr.trim().is_empty() { "unknown error" } else { output.stderr.trim() }
            ),
            Err(e) => warn!("Failed to process {}: {}", image.display(), e),
        }
    }

    if converted.is_empty() {
        bail!("No images were successfully processed");
    }

    let names: Vec<&str> = converted.iter().map(|c| c.name.as_str()).collect();
    write_image_table(&output_dir, &names)?;
    info!("Converted {} of {} images", converted.len(), images.len());
    Ok(converted)
}

/// Write `generated_images.h` and `generated_images.c` for `names`
pub fn write_image_table(output_dir: &Path, names: &[&str]) -> Result<()> {
    let header_path = output_dir.join("generated_images.h");
    fs::write(&header_path, render_header(names))
        .with_context(|| format!("Failed to write {}", header_path.display()))?;

    let source_path = output_dir.join("generated_images.c");
    fs::write(&source_path, render_source(names))
        .with_context(|| format!("Failed to write {}", source_path.display()))?;
    Ok(())
}

fn render_header(names: &[&str]) -> String {
    let mut out = String::from(
        "#pragma once\n\n#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n#include \"lvgl.h\"\n\n",
    );
    for name in names {
        out.push_str(&format!("extern const lv_img_dsc_t {name};\n"));
    }
    out.push_str(&format!("\n#define IMAGE_COUNT {}\n", names.len()));
    out.push_str("extern const lv_img_dsc_t* images[IMAGE_COUNT];\n\n");
    out.push_str("#ifdef __cplusplus\n}\n#endif\n");
    out
}

fn render_source(names: &[&str]) -> String {
    let entries: Vec<String> = names.iter().map(|name| format!("    &{name}")).collect();
    format!(
        "#include \"generated_images.h\"\n\n\nconst lv_img_dsc_t* images[IMAGE_COUNT] = {{\n{}\n}};\n",
        entries.join(",\n")
    )
}
