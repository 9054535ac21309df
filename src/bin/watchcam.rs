//! watchcam - person-triggered camera recorder
//!
//! Polls the camera for stills, counts people in each one and records a
//! clip whenever someone shows up. Configuration comes from `WATCHCAM_CONFIG`
//! (JSON or TOML), `WATCHCAM_*` environment variables and the flags below,
//! in that order of precedence.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use watchcam::config::{self, WatchConfig};
use watchcam::ui::Ui;
use watchcam::{
    failure_kind, open_engine, request_stop, Camera, PersonDetector, SystemClock, Watcher,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "WATCHCAM_CONFIG")]
    config: Option<PathBuf>,
    /// Seconds to wait after each poll.
    #[arg(long)]
    interval: Option<f64>,
    /// Seconds to record once a person is seen.
    #[arg(long)]
    duration: Option<f64>,
    /// Total poll budget for the run.
    #[arg(long)]
    attempts: Option<u32>,
    /// Stop after the first recording.
    #[arg(long)]
    once: bool,
    /// Show a live preview while capturing.
    #[arg(long)]
    preview: bool,
    /// Camera device path, or stub://<name> for a synthetic sensor.
    #[arg(long)]
    device: Option<String>,
    /// Directory for stills, annotated images and recordings.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Progress display: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = WatchConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, &args)?;
    cfg.validate()?;

    let ui = Ui::detect(Some(args.ui.as_str()));
    let clock = Arc::new(SystemClock);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        if request_stop(&stop_handler) {
            log::warn!("second Ctrl-C, exiting without waiting for the current step");
            std::process::exit(130);
        }
        log::warn!("stop requested; finishing the current step (Ctrl-C again to exit now)");
    })
    .context("error setting Ctrl-C handler")?;

    let camera = Camera::new(cfg.camera_config(), clock.clone())?.with_ui(ui.clone());
    let mut detector = {
        let _stage = ui.stage(&format!(
            "loading {} detection engine",
            cfg.detector.backend.name()
        ));
        PersonDetector::new(open_engine(&cfg.detector)?).with_annotations(cfg.detector.annotate)
    };
    detector.warm_up()?;

    log::info!(
        "watchcam running. device={} output={}",
        cfg.camera.device,
        cfg.output_dir.display()
    );
    let mut watcher = Watcher::new(camera, detector, clock).with_stop_flag(stop);
    let videos = match watcher.run(&cfg.watch) {
        Ok(videos) => videos,
        Err(err) => {
            if let Some(kind) = failure_kind(&err) {
                log::error!("watch aborted ({})", kind.code());
            }
            return Err(err);
        }
    };

    if videos.is_empty() {
        println!("no person detected; nothing recorded");
    }
    for video in &videos {
        println!("{}", video.display());
    }
    Ok(())
}

fn apply_args(cfg: &mut WatchConfig, args: &Args) -> Result<()> {
    if let Some(secs) = args.interval {
        cfg.watch.interval = config::seconds("--interval", secs)?;
    }
    if let Some(secs) = args.duration {
        cfg.watch.duration = config::seconds("--duration", secs)?;
    }
    if let Some(attempts) = args.attempts {
        cfg.watch.attempts = attempts;
    }
    if args.once {
        cfg.watch.repeat = false;
    }
    if args.preview {
        cfg.watch.preview = true;
    }
    if let Some(device) = &args.device {
        cfg.camera.device = device.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = dir.clone();
    }
    if !matches!(args.ui.as_str(), "auto" | "plain" | "pretty") {
        return Err(anyhow!("--ui must be one of auto, plain, pretty"));
    }
    Ok(())
}
