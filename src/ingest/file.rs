//! Local file frame source.
//!
//! `FileSource` opens a local video file with the first decoder strategy that
//! accepts it. Strategies are tried in order:
//!
//! 1. FFmpeg demux + decode (`ingest-file-ffmpeg`)
//! 2. GStreamer `filesrc ! decodebin` (`ingest-file-gstreamer`)
//!
//! Codec availability differs by platform, so a file FFmpeg rejects may still
//! play through the GStreamer plugin set. The source is unavailable only when
//! every strategy fails or none is compiled in.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use super::VideoSource;
use crate::frame::Frame;

/// Decoder backend used to open a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenStrategy {
    Ffmpeg,
    Gstreamer,
}

impl OpenStrategy {
    /// Strategies in the order they are attempted.
    pub const ALL: [OpenStrategy; 2] = [OpenStrategy::Ffmpeg, OpenStrategy::Gstreamer];

    /// Whether this strategy was compiled into the binary.
    pub fn is_compiled(self) -> bool {
        match self {
            OpenStrategy::Ffmpeg => cfg!(feature = "ingest-file-ffmpeg"),
            OpenStrategy::Gstreamer => cfg!(feature = "ingest-file-gstreamer"),
        }
    }

    fn open(self, path: &Path) -> Result<Box<dyn VideoSource>> {
        match self {
            OpenStrategy::Ffmpeg => {
                #[cfg(feature = "ingest-file-ffmpeg")]
                {
                    Ok(Box::new(super::file_ffmpeg::FfmpegFileSource::open(path)?))
                }
                #[cfg(not(feature = "ingest-file-ffmpeg"))]
                {
                    let _ = path;
                    Err(anyhow!("requires the ingest-file-ffmpeg feature"))
                }
            }
            OpenStrategy::Gstreamer => {
                #[cfg(feature = "ingest-file-gstreamer")]
                {
                    Ok(Box::new(
                        super::file_gstreamer::GstreamerFileSource::open(path)?,
                    ))
                }
                #[cfg(not(feature = "ingest-file-gstreamer"))]
                {
                    let _ = path;
                    Err(anyhow!("requires the ingest-file-gstreamer feature"))
                }
            }
        }
    }
}

impl fmt::Display for OpenStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenStrategy::Ffmpeg => f.write_str("ffmpeg"),
            OpenStrategy::Gstreamer => f.write_str("gstreamer"),
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    path: PathBuf,
    strategy: OpenStrategy,
    inner: Box<dyn VideoSource>,
    frames_read: u64,
}

impl FileSource {
    /// Open `path` with the first strategy that succeeds.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &OpenStrategy::ALL)
    }

    /// Open `path` trying only the given strategies, in order.
    pub fn open_with(path: &Path, strategies: &[OpenStrategy]) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }

        let mut failures = Vec::with_capacity(strategies.len());
        for &strategy in strategies {
            match strategy.open(path) {
                Ok(inner) => {
                    log::info!("FileSource: opened {} ({})", path.display(), strategy);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        strategy,
                        inner,
                        frames_read: 0,
                    });
                }
                Err(e) if !strategy.is_compiled() => {
                    log::debug!("FileSource: {} skipped: {:#}", strategy, e);
                    failures.push(format!("{}: {:#}", strategy, e));
                }
                Err(e) => {
                    log::warn!(
                        "FileSource: {} could not open {}: {:#}",
                        strategy,
                        path.display(),
                        e
                    );
                    failures.push(format!("{}: {:#}", strategy, e));
                }
            }
        }

        if failures.is_empty() {
            return Err(anyhow!("no decoder strategy configured"));
        }
        Err(anyhow!(
            "no decoder could open {} ({})",
            path.display(),
            failures.join("; ")
        ))
    }

    pub fn strategy(&self) -> OpenStrategy {
        self.strategy
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSource for FileSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.read()?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()?;
        log::debug!(
            "FileSource: rewound {} after {} frames",
            self.path.display(),
            self.frames_read
        );
        Ok(())
    }
}

fn is_local_file_path(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return false;
    }
    !raw.contains("://")
}
