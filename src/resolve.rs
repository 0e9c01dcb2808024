//! Input resolution: which video file to stream.

use std::path::{Component, Path, PathBuf};

use crate::error::StartupError;

/// Container extensions picked up by the directory scan (case-insensitive).
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "webm"];

/// Resolve the video to stream.
///
/// An explicit path is made absolute and lexically normalized and must name
/// an existing regular file. Without one, `video_dir` is scanned for the
/// first video in sorted filename order.
pub fn resolve_input(explicit: Option<&Path>, video_dir: &Path) -> Result<PathBuf, StartupError> {
    if let Some(raw) = explicit {
        let path = absolute_normalized(raw);
        if path.is_file() {
            return Ok(path);
        }
        return Err(StartupError::InvalidInputPath { path });
    }

    match find_video(video_dir) {
        Some(path) if path.is_file() => Ok(path),
        _ => Err(StartupError::NoInputResolved {
            dir: absolute_normalized(video_dir),
        }),
    }
}

/// First entry of `dir`, by sorted filename, with a known video extension.
pub fn find_video(dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("cannot scan {} for videos: {}", dir.display(), e);
            return None;
        }
    };
    let mut names: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect();
    names.sort();
    names
        .into_iter()
        .map(PathBuf::from)
        .find(|name| has_video_extension(name))
        .map(|name| dir.join(name))
}

pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Absolute form of `path` with `.` and `..` collapsed, without touching the
/// filesystem beyond reading the working directory.
pub fn absolute_normalized(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    normalize_lexically(&joined)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` at the root stays at the root.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_video_extension(Path::new("clip.MP4")));
        assert!(has_video_extension(Path::new("clip.webm")));
        assert!(!has_video_extension(Path::new("clip.gif")));
        assert!(!has_video_extension(Path::new("mp4")));
    }

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c/clip.mp4")),
            PathBuf::from("/a/c/clip.mp4")
        );
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("../x/..")), PathBuf::from(".."));
        assert!(absolute_normalized(Path::new("x/../clip.mp4")).is_absolute());
    }

    #[test]
    fn parent_above_root_is_dropped() {
        assert_eq!(normalize_lexically(Path::new("/a/../../b")), PathBuf::from("/b"));
        assert_eq!(
            normalize_lexically(Path::new("/../../../tmp/x/clip.mp4")),
            PathBuf::from("/tmp/x/clip.mp4")
        );
    }

    #[test]
    fn explicit_path_climbing_above_root_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clip = dir.path().join("clip.mp4");
        fs::write(&clip, b"x").expect("write");
        let climbing = PathBuf::from("/../../../..").join(clip.strip_prefix("/").expect("absolute"));
        assert_eq!(resolve_input(Some(&climbing), dir.path()).ok(), Some(clip));
    }

    #[test]
    fn scan_picks_first_sorted_video() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["notes.txt", "b.mov", "a.MKV", "c.mp4"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        assert_eq!(find_video(dir.path()), Some(dir.path().join("a.MKV")));
    }

    #[test]
    fn scan_of_missing_dir_finds_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(find_video(&dir.path().join("absent")), None);
    }

    #[test]
    fn explicit_missing_file_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.mp4");
        match resolve_input(Some(&missing), dir.path()) {
            Err(StartupError::InvalidInputPath { path }) => assert_eq!(path, missing),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn explicit_directory_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            resolve_input(Some(dir.path()), dir.path()),
            Err(StartupError::InvalidInputPath { .. })
        ));
    }

    #[test]
    fn empty_dir_resolves_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            resolve_input(None, dir.path()),
            Err(StartupError::NoInputResolved { .. })
        ));
    }

    #[test]
    fn video_named_directory_is_not_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("folder.mp4")).expect("mkdir");
        assert!(matches!(
            resolve_input(None, dir.path()),
            Err(StartupError::NoInputResolved { .. })
        ));
    }

    #[test]
    fn explicit_existing_file_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clip = dir.path().join("clip.avi");
        fs::write(&clip, b"x").expect("write");
        let dotted = dir.path().join(".").join("clip.avi");
        assert_eq!(resolve_input(Some(&dotted), Path::new("unused")).ok(), Some(clip));
    }
}
