use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heartfelt_lib::{
    config::{FrameConfig, ValidationConfig},
    detectors::{detect_peaks_and_troughs, repair_order, PeakDetectorConfig},
    io::{frame as frame_io, text as text_io},
    pipeline::{estimate_pressure, frame_vitals, validate_window},
    scaler::Scaler,
    signal::TimeSeries,
};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "heartfelt",
    version,
    about = "PPG window validation and vitals extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bandpass and quality-check one PPG window read from stdin or --input file
    ValidateWindow {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Overrides the sampling frequency from --config
        #[arg(long)]
        fs: Option<f64>,
        /// TOML validation settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON min-max scaler asset; adds normalised channels to the report
        #[arg(long)]
        scaler: Option<PathBuf>,
    },
    /// Detect peaks and troughs of an already filtered signal
    FindPeaks {
        #[arg(long, default_value_t = 125.0)]
        fs: f64,
        #[arg(long, default_value_t = 1.0)]
        windowsize: f64,
        #[arg(long, default_value_t = 20.0)]
        ma_perc: f64,
        /// Enforce strict peak/trough alternation
        #[arg(long)]
        repair: bool,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Pulse rate and SpO2 from a raw device frame CSV (ppg or red/ir columns)
    FrameVitals {
        #[arg(long)]
        input: PathBuf,
        /// Overrides the sampling frequency from --config
        #[arg(long)]
        fs: Option<f64>,
        /// TOML frame settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Systolic/diastolic pressure from a normalised ABP prediction
    EstimatePressure {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        scaler: PathBuf,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::ValidateWindow {
            input,
            fs,
            config,
            scaler,
        } => cmd_validate_window(input.as_deref(), fs, config.as_deref(), scaler.as_deref())?,
        Commands::FindPeaks {
            fs,
            windowsize,
            ma_perc,
            repair,
            input,
        } => cmd_find_peaks(fs, windowsize, ma_perc, repair, input.as_deref())?,
        Commands::FrameVitals { input, fs, config } => {
            cmd_frame_vitals(&input, fs, config.as_deref())?
        }
        Commands::EstimatePressure {
            input,
            scaler,
            fs,
            config,
        } => cmd_estimate_pressure(input.as_deref(), &scaler, fs, config.as_deref())?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_validation_config(path: Option<&Path>, fs: Option<f64>) -> Result<ValidationConfig> {
    let mut cfg = match path {
        Some(path) => ValidationConfig::from_toml_file(path)?,
        None => ValidationConfig::default(),
    };
    if let Some(fs) = fs {
        cfg.fs = fs;
        cfg.validate()?;
    }
    log::debug!("validation config: {cfg:?}");
    Ok(cfg)
}

fn load_scaler(path: &Path) -> Result<Scaler> {
    Scaler::from_json_file(path).with_context(|| format!("loading scaler {}", path.display()))
}

fn cmd_validate_window(
    input: Option<&Path>,
    fs: Option<f64>,
    config: Option<&Path>,
    scaler: Option<&Path>,
) -> Result<()> {
    let cfg = load_validation_config(config, fs)?;
    let scaler = scaler.map(load_scaler).transpose()?;
    let raw = read_samples(input)?;
    let report = validate_window(&raw, &cfg, scaler.as_ref())?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_find_peaks(
    fs: f64,
    windowsize: f64,
    ma_perc: f64,
    repair: bool,
    input: Option<&Path>,
) -> Result<()> {
    let ts = TimeSeries::sanitized(fs, &read_samples(input)?);
    let detector = PeakDetectorConfig {
        windowsize,
        ma_perc,
    };
    let mut idx = detect_peaks_and_troughs(&ts.data, ts.fs, &detector);
    if repair {
        idx = repair_order(&idx);
    }
    println!("{}", serde_json::to_string(&idx)?);
    Ok(())
}

fn cmd_frame_vitals(input: &Path, fs: Option<f64>, config: Option<&Path>) -> Result<()> {
    let mut cfg = match config {
        Some(path) => FrameConfig::from_toml_file(path)?,
        None => FrameConfig::default(),
    };
    if let Some(fs) = fs {
        cfg.fs = fs;
        cfg.validate()?;
    }
    let frame = frame_io::read_frame_csv(input, cfg.fs)?;
    let vitals = frame_vitals(&frame, &cfg)?;
    println!("{}", serde_json::to_string(&vitals)?);
    Ok(())
}

fn cmd_estimate_pressure(
    input: Option<&Path>,
    scaler: &Path,
    fs: Option<f64>,
    config: Option<&Path>,
) -> Result<()> {
    let cfg = load_validation_config(config, fs)?;
    let scaler = load_scaler(scaler)?;
    let prediction = read_samples(input)?;
    let estimate = estimate_pressure(&prediction, &scaler, cfg.fs, &cfg.peak_detector());
    println!("{}", serde_json::to_string(&estimate)?);
    Ok(())
}
