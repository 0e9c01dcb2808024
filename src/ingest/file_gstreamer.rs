//! Local file frame source using GStreamer.
//!
//! Pipeline: `filesrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink`.
//! Unlike a live camera pipeline the appsink keeps every buffer (no dropping)
//! and does not sync to the clock, so frames are pulled as fast as the
//! consumer asks for them.

use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;
use std::path::Path;

use super::VideoSource;
use crate::frame::Frame;

/// Upper bound on pipeline preroll and on a single sample pull.
const PULL_TIMEOUT_SECS: u64 = 5;

pub(crate) struct GstreamerFileSource {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
}

impl GstreamerFileSource {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let location = path.to_string_lossy().replace('"', "\\\"");
        let pipeline_description = format!(
            "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false",
            location
        );
        let pipeline = gstreamer::parse::launch(&pipeline_description)
            .context("build file pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("file pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(2);
        appsink.set_drop(false);
        appsink.set_sync(false);

        let source = Self { pipeline, appsink };
        source.preroll()?;
        Ok(source)
    }

    /// Bring the pipeline to Playing, failing if the file cannot be decoded.
    fn preroll(&self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| self.bus_error("pause file pipeline"))?;
        let (result, _, _) = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(PULL_TIMEOUT_SECS));
        result.map_err(|_| self.bus_error("preroll file pipeline"))?;
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|_| self.bus_error("set file pipeline to Playing"))?;
        Ok(())
    }

    fn bus_error(&self, action: &str) -> anyhow::Error {
        let detail = self.pipeline.bus().and_then(|bus| {
            bus.timed_pop_filtered(
                gstreamer::ClockTime::ZERO,
                &[gstreamer::MessageType::Error],
            )
        });
        match detail.as_ref().map(|message| message.view()) {
            Some(gstreamer::MessageView::Error(err)) => {
                anyhow!("{} failed: {}", action, err.error())
            }
            _ => anyhow!("{} failed", action),
        }
    }
}

impl VideoSource for GstreamerFileSource {
    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let timeout = gstreamer::ClockTime::from_seconds(PULL_TIMEOUT_SECS);
        match self.appsink.try_pull_sample(timeout) {
            Some(sample) => sample_to_frame(&sample).map(Some),
            None if self.appsink.is_eos() => Ok(None),
            None => Err(self.bus_error("pull file sample")),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.pipeline
            .seek_simple(
                gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                gstreamer::ClockTime::ZERO,
            )
            .context("seek file pipeline to start")?;
        Ok(())
    }
}

impl Drop for GstreamerFileSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("failed to stop file pipeline: {:?}", e);
        }
    }
}

fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame> {
    let buffer = sample.buffer().context("file sample missing buffer")?;
    let caps = sample.caps().context("file sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse file caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map file buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("file buffer is shorter than its caps")?;
        return Frame::from_rgb(pixels.to_vec(), width, height);
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("file buffer row is out of bounds")?,
        );
    }

    Frame::from_rgb(pixels, width, height)
}
