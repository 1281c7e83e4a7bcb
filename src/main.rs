use anyhow::{bail, Context};
use autocollimator::logging::init_logging;
use autocollimator::*;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "autocollimator")]
#[command(about = "Beam-position measurement and straightness analysis for an autocollimator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live pipeline and print periodic status lines
    Live {
        /// Replay images from this directory instead of the simulated beam
        #[arg(short, long)]
        images: Option<PathBuf>,

        /// Restart the image sequence when it runs out
        #[arg(long)]
        loop_images: bool,

        /// How long to run, in seconds
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Zero both axes this many seconds after start
        #[arg(long)]
        zero_after: Option<f64>,

        /// Average both axes from start, for the given seconds or the
        /// configured window when no value follows
        #[arg(long, num_args = 0..=1)]
        average: Option<Option<f64>>,
    },

    /// Measure a straightness profile on a simulated stage
    Measure {
        /// Number of stage positions
        #[arg(short = 'n', long, default_value = "5")]
        positions: usize,

        /// Stage increment in metres (defaults to the configured value)
        #[arg(long)]
        increment: Option<String>,

        /// Averaging time per position in seconds (defaults to the configured value)
        #[arg(short, long)]
        timeframe: Option<String>,

        /// Result unit: microns or arcseconds
        #[arg(short, long, default_value = "microns")]
        unit: String,

        /// Simulated mirror bow across the travel, in pixels
        #[arg(long, default_value = "0.5")]
        bow_px: f64,

        /// JSON export path; a directory gets a timestamped file name, and
        /// <YYYY-MM-DD_HH_MM_SS> in a file name is replaced by the time
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit the beam peak in a single image file
    Fit {
        /// Path to the image
        image: PathBuf,
    },

    /// Write the default configuration
    Config {
        /// Output path; a .json extension writes JSON, anything else TOML
        #[arg(short, long, default_value = "autocollimator.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config_or_default(cli.config.as_deref());
    if cli.verbose > 0 {
        config.logging.global_level = match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
        .to_string();
    }
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Live { images, loop_images, duration, zero_after, average } => {
            handle_live(&config, images, loop_images, duration, zero_after, average)?;
        }
        Commands::Measure { positions, increment, timeframe, unit, bow_px, output } => {
            handle_measure(&config, positions, increment, timeframe, unit, bow_px, output)?;
        }
        Commands::Fit { image } => {
            handle_fit(&config, &image)?;
        }
        Commands::Config { output } => {
            Config::default().save_to_file(&output, ConfigFormat::from_path(&output))?;
            println!("Default configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn handle_live(
    config: &Config,
    images: Option<PathBuf>,
    loop_images: bool,
    duration_s: f64,
    zero_after: Option<f64>,
    average: Option<Option<f64>>,
) -> anyhow::Result<()> {
    let run_for = config::seconds("duration", duration_s)?;
    let zero_at = zero_after.map(|s| config::seconds("zero-after", s)).transpose()?;
    let average = average
        .map(|s| s.map(|s| config::seconds("average", s)).transpose())
        .transpose()?;

    let source: Box<dyn FrameSource> = match images {
        Some(dir) => Box::new(ImageSequenceSource::from_dir(&dir)?.looping(loop_images)),
        None => Box::new(SimulatedBeamSource::new(config.acquisition.simulation.clone())?),
    };
    println!("Starting live pipeline on {} source", source.name());

    let (producer, handle) = build_producer(source, config)?;
    let producer = producer.spawn()?;

    match average {
        Some(Some(window)) => handle.start_averaging_for(window)?,
        Some(None) => handle.start_averaging()?,
        None => {}
    }

    let start = Instant::now();
    let mut zeroed = false;
    let mut next_status = start;

    while start.elapsed() < run_for && !producer.is_finished() {
        if let Some(at) = zero_at.filter(|at| !zeroed && start.elapsed() >= *at) {
            for axis in Axis::BOTH {
                match handle.reset_zero(axis) {
                    Ok(zero) => println!("{} zeroed at {:.3} px after {:.1} s", axis, zero, at.as_secs_f64()),
                    Err(e) => println!("{} not zeroed: {}", axis, e),
                }
            }
            zeroed = true;
        }
        if Instant::now() >= next_status {
            print_status(&handle.snapshot());
            next_status += Duration::from_millis(500);
        }
        thread::sleep(config.display.refresh_interval());
    }

    let frames = producer.stop()?;
    let snapshot = handle.snapshot();
    print_status(&snapshot);
    println!("Processed {} frames", frames);
    Ok(())
}

fn print_status(snapshot: &DisplaySnapshot) {
    let fmt_peak = |fit: Option<PeakFitResult>| match fit {
        Some(fit) => format!("{:8.3} px (σ {:.2})", fit.center, fit.sigma),
        None => "      -- px".to_string(),
    };
    let fmt_avg = |avg: Option<f64>| match avg {
        Some(v) => format!("{:+.3}\"", v),
        None => "--".to_string(),
    };
    println!(
        "X {} {:+9.3}\" | Y {} {:+9.3}\" | avg X {} Y {} | {:5.1} fps | {} frames",
        fmt_peak(snapshot.peaks.x),
        snapshot.latest.x,
        fmt_peak(snapshot.peaks.y),
        snapshot.latest.y,
        fmt_avg(snapshot.averaged.x),
        fmt_avg(snapshot.averaged.y),
        snapshot.fps,
        snapshot.frames,
    );
    if let Some(error) = &snapshot.last_error {
        println!("Producer stopped: {}", error);
    }
}

#[derive(Serialize)]
struct StraightnessExport<'a> {
    recorded_at: DateTime<Local>,
    pixel_pitch: &'a str,
    focal_length: &'a str,
    arcsec_per_pixel: f64,
    outcome: &'a StraightnessOutcome,
}

fn handle_measure(
    config: &Config,
    positions: usize,
    increment: Option<String>,
    timeframe: Option<String>,
    unit: String,
    bow_px: f64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    if positions < 2 {
        bail!("a straightness profile needs at least two positions");
    }
    let increment = increment.unwrap_or_else(|| config.straightness.default_increment_m.to_string());
    let timeframe = timeframe.unwrap_or_else(|| config.straightness.default_timeframe_s.to_string());

    let source = SimulatedBeamSource::new(config.acquisition.simulation.clone())?;
    let beam = source.control();
    let (producer, handle) = build_producer(Box::new(source), config)?;
    let producer = producer.spawn()?;

    wait_for_first_peak(&handle, config.acquisition.frame_timeout())?;
    for axis in Axis::BOTH {
        handle.reset_zero(axis)?;
    }

    println!("Measuring {} positions ({} per position)", positions, unit);
    let mut last = None;
    for position in 1..=positions {
        // Mirror bow plus a constant tilt the detrend removes.
        let t = (position - 1) as f64 / (positions - 1) as f64;
        let offset = bow_px * (std::f64::consts::PI * t).sin() + 0.2 * t;
        beam.set_offset(offset, 0.5 * offset);
        thread::sleep(Duration::from_millis(2 * config.acquisition.simulation.frame_interval_ms));

        let request = MeasurementRequest::parse(&increment, &timeframe, &position.to_string(), &unit)?;
        let outcome = handle.take_measurement(&request, &Cancellation::never())?;
        println!(
            "  position {:>2}: X {:+.4} Y {:+.4} {} (min-max X {:.4} Y {:.4}, {} / {} samples)",
            position,
            outcome.values.x,
            outcome.values.y,
            outcome.unit,
            outcome.min_max.x,
            outcome.min_max.y,
            outcome.sample_counts.x,
            outcome.sample_counts.y,
        );
        last = Some(outcome);
    }
    producer.stop()?;

    let outcome = last.context("no measurement was stored")?;
    println!("\nDetrended profile ({}):", outcome.unit);
    println!("  {:>10} {:>12} {:>12}", "distance m", "X", "Y");
    let distances = outcome.profiles.x.distances(outcome.increment_m);
    for (i, distance) in distances.iter().enumerate() {
        println!(
            "  {:>10.3} {:>+12.4} {:>+12.4}",
            distance, outcome.profiles.x.values[i], outcome.profiles.y.values[i]
        );
    }
    println!("Straightness (min-max): X {:.4} Y {:.4} {}", outcome.min_max.x, outcome.min_max.y, outcome.unit);

    if let Some(output) = output {
        let now = Local::now();
        let path = export_path(&output, now);
        let export = StraightnessExport {
            recorded_at: now,
            pixel_pitch: &config.optics.pixel_pitch,
            focal_length: &config.optics.focal_length,
            arcsec_per_pixel: config.optics.converter()?.factor(),
            outcome: &outcome,
        };
        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Results saved to {}", path.display());
    }
    Ok(())
}

fn wait_for_first_peak(handle: &LiveHandle, timeout: Duration) -> anyhow::Result<()> {
    let start = Instant::now();
    loop {
        let snapshot = handle.snapshot();
        if snapshot.peaks.x.is_some() && snapshot.peaks.y.is_some() {
            return Ok(());
        }
        if let Some(error) = snapshot.last_error {
            bail!("producer stopped before the first peak: {}", error);
        }
        if start.elapsed() > timeout {
            bail!("no beam peak found within {:?}", timeout);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn export_path(output: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
    if output.is_dir() {
        return output.join(format!("straightness_{}.json", stamp));
    }
    let text = output.to_string_lossy();
    if text.contains("<YYYY-MM-DD_HH_MM_SS>") {
        PathBuf::from(text.replace("<YYYY-MM-DD_HH_MM_SS>", &stamp))
    } else {
        output.to_path_buf()
    }
}

fn handle_fit(config: &Config, path: &Path) -> anyhow::Result<()> {
    let frame = load_frame(path).with_context(|| format!("loading {}", path.display()))?;
    let fitter = build_fitter(config.processing.processor, config.processing.fit)?;
    let pipeline = PeakPipeline::new(config.processing.channel, fitter);
    let converter = config.optics.converter()?;
    let analysis = pipeline.analyze(&frame)?;

    let axis_report = |axis: Axis| match &analysis.fits[axis] {
        Ok(fit) => {
            let center = (analysis.profiles[axis].len() as f64 - 1.0) / 2.0;
            serde_json::json!({
                "amplitude": fit.amplitude,
                "center_px": fit.center,
                "sigma_px": fit.sigma,
                "offset_from_center_arcsec": converter.pixels_to_arcsec(fit.center - center),
            })
        }
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };

    let report = serde_json::json!({
        "image": path.display().to_string(),
        "width": frame.width(),
        "height": frame.height(),
        "channels": frame.channels(),
        "bit_depth": frame.bit_depth(),
        "fitter": pipeline.fitter_name(),
        "x": axis_report(Axis::X),
        "y": axis_report(Axis::Y),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
