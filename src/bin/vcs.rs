use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vehicle_counter::counter::{
    parse_vertices, CountLogWriter, CounterConfig, DetectorKind, FrameSink, FrameSource,
    ImageSequenceReader, ImageSequenceWriter, LinePosition, TrackerKind, VehicleCounter,
};

#[derive(Parser, Debug)]
#[command(name = "vcs", about = "Vehicle tracking and line-crossing counting")]
struct Args {
    /// Directory with input frames (image files, processed in file name order)
    input_dir: PathBuf,
    /// YAML configuration file; flags below override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Region of interest vertices, e.g. "0,0|640,0|640,480|0,480"
    #[arg(long)]
    droi: Option<String>,
    /// Draw the region of interest on output frames
    #[arg(long)]
    showdroi: bool,
    /// Max consecutive detection failures
    #[arg(long)]
    mcdf: Option<usize>,
    /// Max consecutive tracking failures
    #[arg(long)]
    mctf: Option<usize>,
    /// Detection interval in frames
    #[arg(long)]
    di: Option<usize>,
    /// Detector backend (bgsub)
    #[arg(long)]
    detector: Option<DetectorKind>,
    /// Tracker backend (template, adaptive_template)
    #[arg(long)]
    tracker: Option<TrackerKind>,
    /// Counting line position (top, bottom, left, right)
    #[arg(long)]
    clposition: Option<LinePosition>,
    /// Write annotated frames and the count log
    #[arg(long)]
    record: bool,
    /// Directory for annotated frames
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// Count log path
    #[arg(long, default_value = "log.txt")]
    log_file: PathBuf,
    /// Save an annotated screenshot every N frames
    #[arg(long, value_name = "N")]
    screenshot_every: Option<u64>,
}

fn build_config(args: &Args) -> Result<CounterConfig> {
    let mut config = match &args.config {
        Some(path) => CounterConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CounterConfig::default(),
    };
    if let Some(droi) = &args.droi {
        config.roi = Some(parse_vertices(droi).context("Invalid --droi value")?);
    }
    config.show_roi |= args.showdroi;
    if let Some(mcdf) = args.mcdf {
        config.mcdf = mcdf;
    }
    if let Some(mctf) = args.mctf {
        config.mctf = mctf;
    }
    if let Some(di) = args.di {
        config.di = di;
    }
    if let Some(detector) = args.detector {
        config.detector = detector;
    }
    if let Some(tracker) = args.tracker {
        config.tracker = tracker;
    }
    if let Some(position) = args.clposition {
        config.line_position = position;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vehicle_counter=info,vcs=info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let mut source = ImageSequenceReader::open(&args.input_dir)
        .with_context(|| format!("Failed to open {}", args.input_dir.display()))?;
    let Some(first) = source.read().context("Failed to read first frame")? else {
        return Ok(());
    };
    info!(
        frames = source.len(),
        detector = %config.detector,
        tracker = %config.tracker,
        di = config.di,
        mcdf = config.mcdf,
        mctf = config.mctf,
        line = %config.line_position,
        "starting vehicle counter"
    );
    let mut counter =
        VehicleCounter::new(&first, &config).context("Failed to create vehicle counter")?;

    let (mut sink, mut log) = if args.record {
        let sink = ImageSequenceWriter::create(&args.output_dir)
            .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
        let log = CountLogWriter::create(&args.log_file)
            .with_context(|| format!("Failed to create {}", args.log_file.display()))?;
        (Some(sink), Some(log))
    } else {
        (None, None)
    };
    let screenshots_dir = PathBuf::from("screenshots");
    if args.screenshot_every.is_some() {
        std::fs::create_dir_all(&screenshots_dir).context("Failed to create screenshots dir")?;
    }

    let mut next = Some(first);
    while let Some(frame) = next {
        let records = counter.count(&frame)?;
        if let Some(log) = log.as_mut() {
            log.write_records(&records)?;
        }
        let needs_screenshot = args
            .screenshot_every
            .map(|n| n > 0 && counter.frame_count() % n == 0)
            .unwrap_or(false);
        if sink.is_some() || needs_screenshot {
            let annotated = counter.visualize();
            if let Some(sink) = sink.as_mut() {
                sink.write(&annotated)?;
            }
            if needs_screenshot {
                let path = screenshots_dir.join(format!("ss_{}.png", Uuid::new_v4().simple()));
                annotated
                    .save(&path)
                    .with_context(|| format!("Failed to save {}", path.display()))?;
                info!(path = %path.display(), "screenshot saved");
            }
        }
        next = source.read()?;
    }

    info!(
        frames = counter.frame_count(),
        vehicles = counter.vehicle_count(),
        "done"
    );
    Ok(())
}
