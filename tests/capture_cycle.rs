use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use watchcam::ui::{self, Ui};
use watchcam::{
    failure_kind, Camera, CameraConfig, FailureKind, ManualClock, PersonDetector, StubEngine,
    WatchParams, Watcher,
};

fn clock() -> Arc<ManualClock> {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(21, 15, 0)
        .unwrap();
    Arc::new(ManualClock::starting_at(start))
}

fn camera(dir: &Path, device: &str, clock: Arc<ManualClock>) -> Camera {
    let config = CameraConfig {
        device: device.to_string(),
        width: 48,
        height: 32,
        fps: 5,
        warmup_frames: 0,
        output_dir: dir.to_path_buf(),
    };
    Camera::new(config, clock)
        .expect("synthetic camera")
        .with_ui(Ui::from_args(Some("plain"), false, true))
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();
    found.sort();
    found
}

fn params(attempts: u32, repeat: bool) -> WatchParams {
    WatchParams {
        interval: Duration::ZERO,
        duration: Duration::from_secs(2),
        attempts,
        repeat,
        preview: false,
    }
}

#[test]
fn person_on_third_poll_records_one_clip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = clock();
    let detector = PersonDetector::new(StubEngine::scripted([0, 0, 1]));
    let mut watcher = Watcher::new(camera(dir.path(), "stub://yard", clock.clone()), detector, clock.clone());

    let videos = watcher.run(&params(3, false)).expect("watch run");

    assert_eq!(videos.len(), 1);
    assert!(videos[0]
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("video_") && name.ends_with(".mjpeg")));
    let clip = fs::read(&videos[0]).expect("read clip");
    assert_eq!(&clip[..2], &[0xFF, 0xD8]);

    let stills = files_with_prefix(dir.path(), "image_");
    assert_eq!(stills.len(), 3);
    assert_eq!(files_with_prefix(dir.path(), "detected_image_").len(), 3);
    assert_eq!(watcher.detector().runs(), 3);
    assert_eq!(watcher.camera().stats().videos, 1);
    // 2 x 5fps
    assert_eq!(watcher.camera().stats().video_frames, 10);
}

#[test]
fn repeat_mode_shares_the_attempt_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = clock();
    let detector =
        PersonDetector::new(StubEngine::scripted([0, 1, 0, 0, 1, 1, 1])).with_annotations(false);
    let mut watcher = Watcher::new(camera(dir.path(), "stub://yard", clock.clone()), detector, clock.clone());

    let videos = watcher.run(&params(5, true)).expect("watch run");

    assert_eq!(videos.len(), 2);
    assert_ne!(videos[0], videos[1]);
    assert_eq!(files_with_prefix(dir.path(), "image_").len(), 5);
    assert_eq!(files_with_prefix(dir.path(), "detected_").len(), 0);
}

#[test]
fn consecutive_stills_get_distinct_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = clock();
    let detector = PersonDetector::new(StubEngine::new()).with_annotations(false);
    let mut watcher = Watcher::new(camera(dir.path(), "stub://yard", clock.clone()), detector, clock.clone());

    let videos = watcher.run(&params(4, true)).expect("watch run");

    assert!(videos.is_empty());
    let stills = files_with_prefix(dir.path(), "image_");
    assert_eq!(stills.len(), 4);
    let pauses = clock.pauses();
    assert!(pauses.contains(&Duration::from_secs(1)));
}

#[test]
fn unavailable_camera_aborts_and_stops_the_preview() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = clock();
    let detector = PersonDetector::new(StubEngine::new());
    let mut watcher = Watcher::new(
        camera(dir.path(), "stub://unavailable", clock.clone()),
        detector,
        clock.clone(),
    );
    let mut params = params(3, true);
    params.preview = true;

    let err = watcher.run(&params).expect_err("camera is unplugged");

    assert_eq!(failure_kind(&err), Some(FailureKind::DeviceUnavailable));
    assert_eq!(ui::active_previews(), 0);
    assert_eq!(watcher.detector().runs(), 0);
    assert!(files_with_prefix(dir.path(), "image_").is_empty());
}
