mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lcdtester::config::Settings;
use lcdtester::convert;
use lcdtester::firmware::FirmwareBuilder;
use lcdtester::install::{
    BootstrapProgress, BootstrapReport, Bootstrapper, PlatformDescriptor, ProgressSink,
};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    match rt.block_on(real_main()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

async fn real_main() -> Result<i32> {
    let args = cli::Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(root) = args.libraries {
        settings.libraries_root = root;
    }
    info!("Libraries root: {}", settings.libraries_root.display());

    match args.sub.unwrap_or(cli::Cmd::Bootstrap) {
        cli::Cmd::Bootstrap => handle_bootstrap(settings).await,
        cli::Cmd::Check => handle_check(settings).await,
        cli::Cmd::Convert { images, output } => handle_convert(settings, images, output).await,
        cli::Cmd::Flash { no_build } => handle_flash(settings, no_build).await,
    }
}

/// Cancel token tripped by Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling the active download");
            trigger.cancel();
        }
    });
    cancel
}

/// Handle check command - presence scan only
async fn handle_check(settings: Settings) -> Result<i32> {
    let bootstrapper = Bootstrapper::new(settings).context("Failed to build HTTP client")?;
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut all_present = true;

    for (kind, present) in bootstrapper.scan().await {
        all_present &= present;
        let (mark, color) = if present { ("✓", Color::Green) } else { ("✗", Color::Red) };
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
        let _ = write!(stdout, "  {mark} ");
        let _ = stdout.reset();
        let state = if present { "present" } else { "missing" };
        let _ = writeln!(stdout, "{} ({})", kind.label(), state);
    }

    Ok(if all_present { 0 } else { 1 })
}

/// Handle bootstrap command - full pass with progress bars
async fn handle_bootstrap(settings: Settings) -> Result<i32> {
    let (tx, rx) = mpsc::channel::<BootstrapProgress>(100);
    let progress_task = tokio::spawn(render_progress(rx));

    let mut bootstrapper = Bootstrapper::new(settings)
        .context("Failed to build HTTP client")?
        .with_progress(ProgressSink::new(tx));
    let report = bootstrapper.run(&cancel_on_ctrl_c()).await;

    // Closes the progress channel
    drop(bootstrapper);
    progress_task.await.ok();

    print_summary(&report);
    Ok(if report.succeeded() { 0 } else { 1 })
}

async fn render_progress(mut rx: mpsc::Receiver<BootstrapProgress>) {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos:>3}%  {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }

    while let Some(event) = rx.recv().await {
        match event.percent() {
            Some(percent) => pb.set_position(percent as u64),
            None => pb.set_position(0),
        }
        pb.set_message(format!("[{}/{}] {}", event.index, event.total, event.message));
    }

    pb.finish_and_clear();
}

fn print_summary(report: &BootstrapReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let color = if report.succeeded() { Color::Green } else { Color::Yellow };

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let headline = if report.succeeded() {
        "Dependencies ready"
    } else {
        "Some dependencies could not be installed"
    };
    let _ = writeln!(stdout, "\n{headline}");
    let _ = stdout.reset();

    let _ = writeln!(stdout, "{} already present", report.already_present().count());
    let _ = write!(stdout, "{}", report.summary());
}

/// Handle convert command - interpreter setup, then image conversion
async fn handle_convert(
    settings: Settings,
    images: Vec<std::path::PathBuf>,
    output: std::path::PathBuf,
) -> Result<i32> {
    let mut bootstrapper = Bootstrapper::new(settings).context("Failed to build HTTP client")?;
    let script = convert::script_path(bootstrapper.verifier())
        .context("Display library has no slot directory")?;

    let interpreter = bootstrapper.interpreter();
    if !interpreter.setup(&cancel_on_ctrl_c()).await {
        let reason = interpreter
            .last_failure()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        anyhow::bail!("Python is not ready ({:?}): {}", interpreter.stage(), reason);
    }

    let converted = convert::convert_images(interpreter, &script, &images, &output).await?;
    println!("Converted {} of {} images into {}", converted.len(), images.len(), output.display());
    Ok(0)
}

/// Handle flash command - configure/build then nrfjprog
async fn handle_flash(settings: Settings, no_build: bool) -> Result<i32> {
    let builder = FirmwareBuilder::new(&settings, PlatformDescriptor::resolve());
    if no_build {
        builder.flash().await?;
    } else {
        builder.build_and_flash().await?;
    }
    println!("Firmware has been flashed to the nRF52 device");
    Ok(0)
}
