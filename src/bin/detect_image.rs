//! detect_image - run the person detector on a single image
//!
//! Prints every detection as `label : confidence%`, then the person count
//! and the path of the annotated copy.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use watchcam::config::WatchConfig;
use watchcam::{open_engine, EngineKind, PersonDetector};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to inspect.
    image: PathBuf,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "WATCHCAM_CONFIG")]
    config: Option<PathBuf>,
    /// ONNX model path.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detection backend: stub or tract.
    #[arg(long)]
    backend: Option<EngineKind>,
    /// Skip writing the annotated copy.
    #[arg(long)]
    no_annotate: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if !args.image.is_file() {
        return Err(anyhow!("image not found: {}", args.image.display()));
    }

    let mut cfg = WatchConfig::load_from(args.config.as_deref())?;
    if let Some(model) = args.model {
        cfg.detector.model_path = model;
    }
    if let Some(backend) = args.backend {
        cfg.detector.backend = backend;
    }

    let engine = open_engine(&cfg.detector)?;
    let mut detector = PersonDetector::new(engine).with_annotations(!args.no_annotate);
    let inspection = detector.inspect(&args.image)?;

    for detection in &inspection.detections {
        println!("{} : {:.2}", detection.label, detection.percentage());
    }
    println!("persons: {}", inspection.summary.persons);
    if let Some(path) = &inspection.annotated {
        println!("annotated: {}", path.display());
    }
    Ok(())
}
