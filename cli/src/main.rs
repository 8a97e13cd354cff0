use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use moodlens_core::{
    client::{AnalysisOutcome, DEFAULT_ENDPOINT},
    pipeline::Pipeline,
    rendering::LabelFace,
    runtime::load_label_face,
    video::{load_frame, save_frame},
};
use moodlens_viewer::ViewerConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "moodlens",
    version,
    about = "Live camera viewer with face, age, gender and emotion overlays",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the camera into a window, annotating every frame.
    Live {
        /// Analysis service endpoint
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Camera device index
        #[arg(short, long, default_value_t = 0)]
        camera: u32,

        /// Delay between frames, in milliseconds
        #[arg(long, default_value_t = 10)]
        interval_ms: u64,

        /// Label font (TrueType/OpenType); auto-discovered when omitted
        #[arg(long)]
        font: Option<PathBuf>,

        /// Window title
        #[arg(long, default_value = "Live Camera Feed")]
        title: String,
    },

    /// Annotate a single image file and write the result.
    Annotate {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output image path
        #[arg(short, long, default_value = "annotated.png")]
        output: PathBuf,

        /// Analysis service endpoint
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Label font (TrueType/OpenType); auto-discovered when omitted
        #[arg(long)]
        font: Option<PathBuf>,
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
        Commands::Live {
            endpoint,
            camera,
            interval_ms,
            font,
            title,
        } => cmd_live(ViewerConfig {
            endpoint,
            camera_index: camera,
            interval: Duration::from_millis(interval_ms),
            font,
            title,
        }),
        Commands::Annotate {
            input,
            output,
            endpoint,
            font,
        } => cmd_annotate(input, output, endpoint, font),
    }
}

// ── Live viewer ───────────────────────────────────────────────────────────────

fn cmd_live(config: ViewerConfig) -> Result<()> {
    info!("Live viewer");
    info!("  endpoint : {}", config.endpoint);
    info!("  camera   : {}", config.camera_index);

    moodlens_viewer::run(config).context("live viewer failed")
}

// ── One-shot annotation ───────────────────────────────────────────────────────

fn cmd_annotate(
    input: PathBuf,
    output: PathBuf,
    endpoint: String,
    font: Option<PathBuf>,
) -> Result<()> {
    info!("Annotate image");
    info!("  input  : {}", input.display());
    info!("  output : {}", output.display());

    let mut frame = load_frame(&input)?;
    let label_face =
        load_label_face(font.as_deref()).map(|face| Box::new(face) as Box<dyn LabelFace>);
    let mut pipeline = Pipeline::connect(endpoint, label_face);

    let pb = spinner("Analyzing…");
    let outcome = pipeline.process(&mut frame);
    match &outcome {
        AnalysisOutcome::Faces(result) => {
            pb.finish_with_message(format!("{} face(s) found.", result.faces.len()))
        }
        AnalysisOutcome::Rejected { status } => {
            pb.finish_with_message(format!("Service answered {status}; no faces drawn."))
        }
        AnalysisOutcome::Failed(e) => {
            pb.finish_with_message(format!("Analysis failed ({e}); no faces drawn."))
        }
    }

    save_frame(&frame, &output)?;
    info!(faces = outcome.faces().len(), "annotated image saved");
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
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
