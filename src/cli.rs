use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "LCD tester toolchain bootstrap, image conversion and flashing")]
pub struct Args {
    /// Sub‑commands (bootstrap if omitted)
    #[command(subcommand)]
    pub sub: Option<Cmd>,

    /// Path to a TOML settings file overriding the compiled-in defaults
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Libraries root (defaults to `<executable dir>/libraries`)
    #[arg(long, global = true)]
    pub libraries: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Download and verify every missing dependency (Exit 0 = all ready)
    Bootstrap,
    /// Report dependency presence without touching the network (Exit 0 = all present)
    Check,
    /// Convert images to LVGL C sources
    Convert {
        /// Images to convert
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output directory for the generated sources
        #[arg(long, short = 'o', default_value = "generated")]
        output: PathBuf,
    },
    /// Configure, build and flash the tester firmware
    Flash {
        /// Skip the configure/build step and flash the existing image
        #[arg(long)]
        no_build: bool,
    },
}
