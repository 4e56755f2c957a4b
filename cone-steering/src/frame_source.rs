use std::time::Duration;

use anyhow::bail;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::config::SourceConfig;

pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> anyhow::Result<Option<Mat>>;
}

pub struct VideoFrameSource {
    cap: VideoCapture,
    frames_read: u64,
}

impl VideoFrameSource {
    pub fn open(source: &SourceConfig) -> anyhow::Result<Self> {
        let cap = match source {
            SourceConfig::File { path } => {
                let Some(path_str) = path.to_str() else {
                    bail!("Video path {} is not valid UTF-8", path.display());
                };
                VideoCapture::from_file(path_str, videoio::CAP_ANY)?
            }
            SourceConfig::Camera { index } => VideoCapture::new(*index, videoio::CAP_ANY)?,
        };
        if !cap.is_opened()? {
            bail!("Failed to open video source {source:?}");
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        log::info!("Opened {source:?} ({width}x{height})");

        Ok(Self { cap, frames_read: 0 })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Position of the last frame read, as reported by the container.
    pub fn position(&self) -> anyhow::Result<Duration> {
        let millis = self.cap.get(videoio::CAP_PROP_POS_MSEC)?;

        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}

impl FrameSource for VideoFrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        self.frames_read += 1;

        Ok(Some(frame))
    }
}
