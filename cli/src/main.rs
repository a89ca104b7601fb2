use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use airwrite_core::{
    config::PipelineConfig,
    persistence::{read_stroke, StrokeStore},
    pipeline::Pipeline,
    segmentation::ColorSegmenter,
    video::{flip_horizontal, open_source, RgbFrame},
};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "airwrite",
    version,
    about = "Track a coloured marker and record its strokes as a dataset",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking pipeline over a video file or a directory of frames.
    Track {
        /// Video file, or directory of PNG/JPEG frames
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset directory for finished strokes
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Mirror every frame before tracking (webcam footage)
        #[arg(long)]
        flip: bool,

        /// Write annotated frames as PNGs into this directory
        #[arg(long)]
        frames_out: Option<PathBuf>,

        /// Do not draw the marker outline and tip
        #[arg(long)]
        no_marker: bool,

        /// Do not draw the in-progress trail
        #[arg(long)]
        no_trails: bool,
    },

    /// Debug aid: write the marker mask of a single image.
    Mask {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Output mask path
        #[arg(short, long, default_value = "mask.png")]
        output: PathBuf,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List dataset entries in index order.
    List {
        /// Dataset directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track {
            input,
            output_dir,
            config,
            flip,
            frames_out,
            no_marker,
            no_trails,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output_dir {
                config.dataset.dir = dir;
            }
            config.render.marker &= !no_marker;
            config.render.trails &= !no_trails;
            cmd_track(input, config, flip, frames_out)
        }
        Commands::Mask {
            image,
            output,
            config,
        } => cmd_mask(image, output, load_config(config.as_deref())?),
        Commands::List { dir } => {
            let dir = dir.unwrap_or_else(|| PipelineConfig::default().dataset.dir);
            cmd_list(dir)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

// ── track ─────────────────────────────────────────────────────────────────────

fn cmd_track(
    input: PathBuf,
    config: PipelineConfig,
    flip: bool,
    frames_out: Option<PathBuf>,
) -> Result<()> {
    info!("Stroke capture");
    info!("  input   : {}", input.display());
    info!("  dataset : {}", config.dataset.dir.display());

    let mut source = open_source(&input)
        .with_context(|| format!("failed to open input: {}", input.display()))?;
    let mut pipeline = Pipeline::new(config)?;

    if let Some(dir) = &frames_out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let pb = spinner("Tracking marker…");
    let mut frame_index = 0u64;
    while let Some(mut frame) = source.next_frame()? {
        if flip {
            flip_horizontal(&mut frame);
        }
        let report = pipeline
            .run_inference(&mut frame)
            .with_context(|| format!("frame {frame_index} failed"))?;
        if let Some(path) = &report.saved {
            pb.println(format!("saved {}", path.display()));
        }
        if let Some(dir) = &frames_out {
            frame.save(dir.join(format!("{frame_index:06}.png")))?;
        }
        frame_index += 1;
        pb.tick();
    }

    let dropped = pipeline.stop();
    if dropped > 0 {
        info!(points = dropped, "input ended mid-stroke; stroke not saved");
    }

    pb.finish_with_message(format!(
        "Done: {} frames, {} strokes saved.",
        frame_index,
        pipeline.strokes_saved()
    ));
    Ok(())
}

// ── mask ──────────────────────────────────────────────────────────────────────

fn cmd_mask(image_path: PathBuf, output: PathBuf, config: PipelineConfig) -> Result<()> {
    let img = image::open(&image_path)
        .with_context(|| format!("failed to open image: {}", image_path.display()))?
        .into_rgb8();
    let frame = RgbFrame::from_image(img, 0);

    let seg = &config.segmentation;
    let segmenter = ColorSegmenter::new(seg.hue_bands, seg.median_kernel, seg.dilate_kernel);
    let mask = segmenter.segment(&frame);
    let on = mask.pixels().filter(|p| p.0[0] > 0).count();

    mask.save(&output)
        .with_context(|| format!("failed to save mask: {}", output.display()))?;
    info!(marker_pixels = on, "mask written to {}", output.display());
    Ok(())
}

// ── list ──────────────────────────────────────────────────────────────────────

fn cmd_list(dir: PathBuf) -> Result<()> {
    let store = StrokeStore::new(&dir, 0);
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("no entries in {}", dir.display());
        return Ok(());
    }
    for entry in entries {
        let points = read_stroke(&entry.path)
            .map(|s| s.len().to_string())
            .unwrap_or_else(|e| format!("unreadable ({e:#})"));
        println!("{:>6}  {:>5}  {}", entry.name.index, points, entry.path.display());
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
