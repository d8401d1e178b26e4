//! camcal CLI: calibrate a camera from chessboard images, or rectify a
//! folder with saved parameters.

use camcal::rectify::RectifyOptions;
use camcal::{rectify_folder, run_pipeline, CalibrationConfig, CameraParams, ChessCornerFinder};
use clap::{Args, Parser, Subcommand};
use std::error::Error as _;
use std::path::PathBuf;

use log::LevelFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "camcal")]
#[command(about = "Camera intrinsic calibration from chessboard images")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect corners, calibrate, report errors and rectify the images.
    Calibrate(CalibrateArgs),

    /// Undistort a folder of images with a saved parameter file.
    Rectify(RectifyArgs),
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// JSON config file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder with calibration images.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Folder for rectified images.
    #[arg(long)]
    dest: Option<PathBuf>,

    /// File name glob, e.g. "*.jpg".
    #[arg(long)]
    pattern: Option<String>,

    /// Output parameter file (JSON with "K" and "D"), default `<dest>/intrinsics.json`.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Output JSON report with per-image results.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Interior corners per row.
    #[arg(long)]
    cols: Option<u32>,

    /// Interior corners per column.
    #[arg(long)]
    rows: Option<u32>,

    /// Square edge length in millimetres.
    #[arg(long)]
    square_size: Option<f64>,

    /// Write corner overlays and rectified previews.
    #[arg(long)]
    show: bool,

    /// Do not write rectified images.
    #[arg(long)]
    no_save: bool,

    /// Process images in parallel.
    #[arg(long)]
    parallel: bool,

    /// Minimum number of usable views.
    #[arg(long)]
    min_views: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct RectifyArgs {
    /// Parameter file written by `calibrate`.
    #[arg(long)]
    params: PathBuf,

    /// Folder with images to rectify.
    #[arg(long, default_value = "images")]
    source: PathBuf,

    /// Output folder.
    #[arg(long, default_value = "rectified")]
    dest: PathBuf,

    /// File name glob.
    #[arg(long, default_value = "*.jpg")]
    pattern: String,

    /// Process images in parallel.
    #[arg(long)]
    parallel: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("failed to initialise logging: {err}");
    }

    let result = match cli.command {
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::Rectify(args) => run_rectify(&args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn verbosity(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, quiet: bool) -> CliResult<()> {
    camcal::core::init_with_level(verbosity(verbose, quiet))?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(verbose: u8, quiet: bool) -> CliResult<()> {
    camcal::core::init_tracing(verbosity(verbose, quiet), false);
    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────

fn build_config(args: &CalibrateArgs) -> CliResult<CalibrationConfig> {
    let mut cfg = match &args.config {
        Some(path) => CalibrationConfig::load_json(path)?,
        None => CalibrationConfig::default(),
    };

    if let Some(v) = &args.source {
        cfg.source_dir = v.clone();
    }
    if let Some(v) = &args.dest {
        cfg.dest_dir = v.clone();
    }
    if let Some(v) = &args.pattern {
        cfg.pattern = v.clone();
    }
    match &args.params {
        Some(v) => cfg.params_path = v.clone(),
        // Keep the parameter file next to the rectified images.
        None if args.dest.is_some() && args.config.is_none() => {
            cfg.params_path = cfg.dest_dir.join("intrinsics.json");
        }
        None => {}
    }
    if let Some(v) = &args.report {
        cfg.report_path = Some(v.clone());
    }
    if let Some(v) = args.cols {
        cfg.board.cols = v;
    }
    if let Some(v) = args.rows {
        cfg.board.rows = v;
    }
    if let Some(v) = args.square_size {
        cfg.board.square_size = v;
    }
    if let Some(v) = args.min_views {
        cfg.solver.min_views = v;
    }
    cfg.show |= args.show;
    cfg.save &= !args.no_save;
    cfg.parallel |= args.parallel;

    Ok(cfg)
}

fn run_calibrate(args: &CalibrateArgs) -> CliResult<()> {
    let cfg = build_config(args)?;
    let finder = ChessCornerFinder::new(cfg.detector.clone());
    let out = run_pipeline(&cfg, &finder)?;

    println!(
        "calibrated from {} of {} image(s): average reprojection error {:.5}px",
        out.extraction.accepted.len(),
        out.extraction.accepted.len() + out.extraction.skipped.len(),
        out.reprojection.average
    );
    println!("parameters: {}", cfg.params_path.display());
    Ok(())
}

// ── rectify ────────────────────────────────────────────────────────────

fn run_rectify(args: &RectifyArgs) -> CliResult<()> {
    let params = CameraParams::load_json(&args.params)?;
    let opts = RectifyOptions {
        dest_dir: args.dest.clone(),
        save: true,
        preview_dir: None,
        parallel: args.parallel,
    };
    let written = rectify_folder(&params, &args.source, &args.pattern, &opts)?;
    println!("{} image(s) written to {}", written.len(), args.dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags_pick_log_level() {
        assert_eq!(verbosity(0, false), LevelFilter::Info);
        assert_eq!(verbosity(1, false), LevelFilter::Debug);
        assert_eq!(verbosity(3, false), LevelFilter::Trace);
        assert_eq!(verbosity(2, true), LevelFilter::Warn);
    }

    #[test]
    fn quiet_and_verbose_parse_before_subcommand() {
        let cli = Cli::try_parse_from(["camcal", "-vv", "rectify", "--params", "k.json"])
            .expect("parse");
        assert_eq!(verbosity(cli.verbose, cli.quiet), LevelFilter::Trace);
        let cli = Cli::try_parse_from(["camcal", "-q", "rectify", "--params", "k.json"])
            .expect("parse");
        assert_eq!(verbosity(cli.verbose, cli.quiet), LevelFilter::Warn);
    }
}
