use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use lake_track_wasm::interpolate::interpolate;
use lake_track_wasm::metrics::{RouteSummary, playback_label, track_duration};
use lake_track_wasm::options::EngineOptions;
use lake_track_wasm::{converter, load_track, parser};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect GPX tracks the way the lake map plays them back")]
struct Args {
    /// JSON file with engine options (camelCase keys, all optional)
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Point count, distance, estimated time, duration and speeds
    Summary { gpx: PathBuf },
    /// Interpolated marker positions at evenly spaced progress values
    Positions {
        gpx: PathBuf,
        #[arg(long, default_value_t = 11)]
        samples: usize,
    },
    /// GeoJSON overlays at a playback progress in [0, 1]
    Overlays {
        gpx: PathBuf,
        #[arg(long)]
        progress: Option<f64>,
    },
    /// Decimated preview points as JSON
    Preview { gpx: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let opts = load_options(args.options.as_deref())?;

    match args.command {
        Command::Summary { gpx } => summary(&gpx, &opts),
        Command::Positions { gpx, samples } => positions(&gpx, samples),
        Command::Overlays { gpx, progress } => {
            let track = load_track(&read(&gpx)?)?;
            let fc = converter::to_overlay_collection(&track, progress, &opts);
            println!("{}", serde_json::to_string_pretty(&fc)?);
            Ok(())
        }
        Command::Preview { gpx } => {
            let points = parser::parse_preview_points(&read(&gpx)?, opts.preview_stride)?;
            println!("{}", serde_json::to_string_pretty(&points)?);
            Ok(())
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<EngineOptions> {
    let Some(path) = path else {
        return Ok(EngineOptions::default());
    };
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let opts: EngineOptions =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(opts.validate()?)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn summary(path: &Path, opts: &EngineOptions) -> Result<()> {
    let track = load_track(&read(path)?).with_context(|| format!("parsing {}", path.display()))?;
    let summary = RouteSummary::of(&track, opts.reference_speed_mph);
    let speeds: Vec<f64> = track.iter().filter_map(|p| p.speed).collect();
    let segments = track.len().saturating_sub(1);
    let degenerate = segments.saturating_sub(speeds.len());

    println!("points:          {}", track.len());
    println!("distance:        {}", summary.distance);
    println!("estimated time:  {}", summary.estimated_time);
    match track_duration(&track) {
        Some(d) => println!("recorded:        {}s", d.num_seconds()),
        None => println!("recorded:        N/A"),
    }
    if !speeds.is_empty() {
        let max = speeds.iter().copied().fold(f64::MIN, f64::max);
        let mean = speeds.iter().sum::<f64>() / speeds.len() as f64;
        println!("speed:           mean {mean:.2} mph, max {max:.2} mph");
    }
    println!("no kinematics:   {degenerate} of {segments} segments");
    Ok(())
}

fn positions(path: &Path, samples: usize) -> Result<()> {
    ensure!(samples >= 2, "--samples must be at least 2");
    let track = load_track(&read(path)?).with_context(|| format!("parsing {}", path.display()))?;
    let last = track.len().saturating_sub(1);

    for i in 0..samples {
        let progress = i as f64 / (samples - 1) as f64;
        let Some(pos) = interpolate(&track, progress) else {
            break;
        };
        let index = (progress * last as f64).floor() as usize;
        println!(
            "{progress:>5.2}  {:>11.6} {:>11.6}  {:>6.1}°  {}",
            pos.lat,
            pos.lon,
            pos.heading,
            playback_label(&track, index)
        );
    }
    Ok(())
}
