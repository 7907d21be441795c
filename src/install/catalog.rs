//! Canonical registry of bootstrap dependencies
//!
//! This module defines the authoritative list of everything the application
//! needs on disk. When adding or removing a dependency, update ONLY the
//! tables below.

use std::fmt;

/// Every dependency the bootstrap pass knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// LVGL graphics library (also ships the image conversion script)
    DisplayLibrary,
    /// nRF5 SDK
    HardwareSdk,
    /// ARM GNU cross toolchain
    CrossToolchain,
    /// LCD tester firmware sources
    FirmwareSource,
    /// CMake
    BuildTool,
    /// Relocatable Python runtime
    PortableInterpreter,
    /// A package installed into the portable interpreter, by install name
    InterpreterPackage(&'static str),
}

/// A file whose existence marks a slot as structurally complete
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub path: &'static str,
    /// Gets the platform executable suffix appended
    pub executable: bool,
}

const fn file(path: &'static str) -> Marker {
    Marker { path, executable: false }
}

const fn exe(path: &'static str) -> Marker {
    Marker { path, executable: true }
}

/// Fixed on-disk shape of a non-package dependency
#[derive(Debug)]
pub struct SlotSpec {
    /// Canonical directory name under the libraries root
    pub slot: &'static str,
    /// Human-readable name used in reports
    pub label: &'static str,
    /// Every marker must exist for the slot to count as present. The
    /// interpreter's own executable is resolved per platform instead.
    pub markers: &'static [Marker],
    /// Top-level archive entries starting with one of these get renamed to `slot`
    pub prefixes: &'static [&'static str],
}

static DISPLAY_LIBRARY: SlotSpec = SlotSpec {
    slot: "lvgl",
    label: "LVGL library (~15MB)",
    markers: &[
        file("lvgl.h"),
        file("src/core/lv_obj.h"),
        file("src/core/lv_obj.c"),
        file("lv_conf_template.h"),
        file("scripts/LVGLImage.py"),
    ],
    prefixes: &["lvgl-"],
};

static HARDWARE_SDK: SlotSpec = SlotSpec {
    slot: "nrf5_sdk",
    label: "nRF52 SDK (~150MB)",
    markers: &[
        file("components/softdevice/s132/headers/nrf_sdm.h"),
        file("components/libraries/util/nordic_common.h"),
        file("modules/nrfx/nrfx.h"),
        file("components/boards/boards.h"),
    ],
    prefixes: &["nRF5_SDK_", "nrf5_sdk_"],
};

static CROSS_TOOLCHAIN: SlotSpec = SlotSpec {
    slot: "arm-gnu-toolchain",
    label: "ARM GNU Toolchain (~100MB)",
    markers: &[
        exe("bin/arm-none-eabi-gcc"),
        exe("bin/arm-none-eabi-g++"),
        exe("bin/arm-none-eabi-as"),
        exe("bin/arm-none-eabi-ld"),
    ],
    prefixes: &["arm-gnu-toolchain-"],
};

static FIRMWARE_SOURCE: SlotSpec = SlotSpec {
    slot: "nrf52-lcd-tester-fw",
    label: "nRF52 LCD Tester Firmware (~1MB)",
    markers: &[file("CMakeLists.txt"), file("src"), file("lv_conf.h")],
    prefixes: &["nrf52-lcd-tester-fw"],
};

static BUILD_TOOL: SlotSpec = SlotSpec {
    slot: "cmake",
    label: "CMake (~40MB)",
    markers: &[
        exe("bin/cmake"),
        file("share/cmake-4.1/Modules/CMakeDetermineSystem.cmake"),
    ],
    prefixes: &["cmake-"],
};

static PORTABLE_INTERPRETER: SlotSpec = SlotSpec {
    slot: "python",
    label: "Embedded Python (~25MB)",
    markers: &[],
    prefixes: &["python"],
};

/// Interpreter package with the snippet that proves it is importable.
///
/// Install names and module names differ (`Pillow` is `PIL`), so the probe
/// is spelled out per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: &'static str,
    pub probe: &'static str,
}

/// Packages required by the LVGL image script
pub const REQUIRED_PACKAGES: &[PackageSpec] = &[
    PackageSpec { name: "Pillow", probe: "import PIL.Image" },
    PackageSpec { name: "pypng", probe: "import png" },
    PackageSpec { name: "lz4", probe: "import lz4.block" },
    PackageSpec { name: "kconfiglib", probe: "import kconfiglib" },
];

/// Non-package dependencies, in bootstrap order
pub const SLOT_KINDS: &[DependencyKind] = &[
    DependencyKind::DisplayLibrary,
    DependencyKind::HardwareSdk,
    DependencyKind::CrossToolchain,
    DependencyKind::FirmwareSource,
    DependencyKind::BuildTool,
    DependencyKind::PortableInterpreter,
];

/// Every dependency a bootstrap pass checks, packages last
pub fn required_kinds() -> Vec<DependencyKind> {
    SLOT_KINDS
        .iter()
        .copied()
        .chain(REQUIRED_PACKAGES.iter().map(|p| DependencyKind::InterpreterPackage(p.name)))
        .collect()
}

/// Look up the probe snippet for a required package
pub fn package_spec(name: &str) -> Option<&'static PackageSpec> {
    REQUIRED_PACKAGES.iter().find(|p| p.name == name)
}

impl DependencyKind {
    /// Slot table entry; `None` for interpreter packages
    pub fn slot_spec(&self) -> Option<&'static SlotSpec> {
        match self {
            DependencyKind::DisplayLibrary => Some(&DISPLAY_LIBRARY),
            DependencyKind::HardwareSdk => Some(&HARDWARE_SDK),
            DependencyKind::CrossToolchain => Some(&CROSS_TOOLCHAIN),
            DependencyKind::FirmwareSource => Some(&FIRMWARE_SOURCE),
            DependencyKind::BuildTool => Some(&BUILD_TOOL),
            DependencyKind::PortableInterpreter => Some(&PORTABLE_INTERPRETER),
            DependencyKind::InterpreterPackage(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DependencyKind::InterpreterPackage(name) => format!("Python package: {name}"),
            other => other.slot_spec().map(|s| s.label.to_string()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::InterpreterPackage(name) => write!(f, "package:{name}"),
            other => match other.slot_spec() {
                Some(spec) => f.write_str(spec.slot),
                None => Ok(()),
            },
        }
    }
}
