//! Media collaborators: audio extraction, vertical crop and re-muxing
//!
//! The pipeline only sees the two traits below. `FfmpegTool` implements both
//! by driving the ffmpeg/ffprobe binaries; `SymphoniaExtractor` demuxes the
//! audio track in-process.

pub mod decode;
pub mod ffmpeg;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio_util::Waveform;
use crate::error::AudioError;

pub use decode::SymphoniaExtractor;
pub use ffmpeg::{check_ffmpeg_available, FfmpegSettings, FfmpegTool};

/// Failures of an external tool process
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} binary not found. Please install FFmpeg or set its path in the config")]
    NotFound(&'static str),
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with code {code:?}: {stderr}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} did not finish within {timeout:?} and was killed")]
    TimedOut {
        tool: &'static str,
        timeout: Duration,
    },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("No audio track found in {0:?}")]
    NoAudioTrack(PathBuf),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

#[derive(Error, Debug)]
pub enum MuxError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("Failed to probe video: {0}")]
    Probe(String),
}

/// Pulls the audio track out of a video as PCM
pub trait AudioExtractor: Send + Sync {
    /// Extract the audio of `video`, writing it as a WAV file at `output`
    fn extract_audio(&self, video: &Path, output: &Path) -> Result<Waveform, ExtractionError>;
}

/// Rewrites video containers
pub trait VideoMuxer: Send + Sync {
    /// Replace the audio track of `video` with the WAV at `audio`
    fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError>;

    /// Center-crop a landscape video to 9:16, writing to `output`.
    ///
    /// Returns the path of the video to use from here on, which is `video`
    /// itself when no transform was needed.
    fn crop_to_vertical(&self, video: &Path, output: &Path) -> Result<PathBuf, MuxError>;
}

/// Which extractor a config selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Ffmpeg,
    Symphonia,
}

/// Crop rectangle for the vertical transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Output height of vertical videos
pub const VERTICAL_HEIGHT: u32 = 720;

/// Centered 9:16 crop for a landscape frame, `None` for portrait or square
pub fn vertical_crop(width: u32, height: u32) -> Option<CropGeometry> {
    if width <= height {
        return None;
    }

    // Even dimensions keep yuv420p encoders happy
    let crop_width = ((height as u64 * 9 / 16) as u32 & !1).max(2);
    let crop_height = height & !1;

    Some(CropGeometry {
        width: crop_width,
        height: crop_height,
        x: (width - crop_width) / 2,
        y: (height - crop_height) / 2,
    })
}
