//! Artifact file names.
//!
//! Stills:    `image_<YYYY-MM-DD>_<HH:MM:SS>.jpg`
//! Videos:    `video_<YYYY-MM-DD>_<HH:MM:SS>.mjpeg`
//! Annotated: the first `image` in the file name becomes `detected_image`;
//!            names without `image` get a `detected_` prefix.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const STILL_PREFIX: &str = "image";
pub const VIDEO_PREFIX: &str = "video";
pub const STILL_EXTENSION: &str = "jpg";
pub const VIDEO_EXTENSION: &str = "mjpeg";

const STAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";
const ANNOTATED_PREFIX: &str = "detected_";

pub fn still_name(at: NaiveDateTime) -> String {
    format!("{}_{}.{}", STILL_PREFIX, at.format(STAMP_FORMAT), STILL_EXTENSION)
}

pub fn video_name(at: NaiveDateTime) -> String {
    format!("{}_{}.{}", VIDEO_PREFIX, at.format(STAMP_FORMAT), VIDEO_EXTENSION)
}

/// First path under `dir` for `file_name` that does not exist yet.
///
/// Collisions get a numeric suffix before the extension (`-1`, `-2`, ...).
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    (1..=u32::MAX)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{stem}-{n}.{ext}")),
            None => dir.join(format!("{stem}-{n}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Where the annotated copy of `image` is written (same directory).
pub fn annotated_path(image: &Path) -> PathBuf {
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let annotated = if file_name.contains(STILL_PREFIX) {
        file_name.replacen(
            STILL_PREFIX,
            &format!("{ANNOTATED_PREFIX}{STILL_PREFIX}"),
            1,
        )
    } else {
        format!("{ANNOTATED_PREFIX}{file_name}")
    };
    image.with_file_name(annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(9, 5, 7, 830)
            .unwrap()
    }

    #[test]
    fn names_use_second_granularity() {
        assert_eq!(still_name(stamp()), "image_2024-01-02_09:05:07.jpg");
        assert_eq!(video_name(stamp()), "video_2024-01-02_09:05:07.mjpeg");
    }

    #[test]
    fn annotated_path_replaces_first_image() {
        let path = Path::new("/tmp/cam/image_2024-01-02_09:05:07.jpg");
        assert_eq!(
            annotated_path(path),
            PathBuf::from("/tmp/cam/detected_image_2024-01-02_09:05:07.jpg")
        );
    }

    #[test]
    fn annotated_path_prefixes_other_names() {
        let path = Path::new("snapshot.jpg");
        assert_eq!(annotated_path(path), PathBuf::from("detected_snapshot.jpg"));
    }

    #[test]
    fn unique_path_suffixes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let name = still_name(stamp());

        let first = unique_path(dir.path(), &name);
        assert_eq!(first, dir.path().join(&name));
        std::fs::write(&first, b"x").unwrap();

        let second = unique_path(dir.path(), &name);
        assert_eq!(
            second,
            dir.path().join("image_2024-01-02_09:05:07-1.jpg")
        );
        std::fs::write(&second, b"x").unwrap();

        let third = unique_path(dir.path(), &name);
        assert_eq!(third, dir.path().join("image_2024-01-02_09:05:07-2.jpg"));
    }
}
