//! Soundtrack enhancement for short videos: spectral noise reduction,
//! band-split EQ presets and re-muxing through ffmpeg.

pub mod audio_clean;
pub mod audio_util;
pub mod error;
pub mod media;
pub mod services;

pub use audio_clean::{
    BandLayout, BandSplitEqualizer, Intensity, NoiseReducer, Pipeline, PipelineError,
    PipelineOptions, PipelineResult,
};
pub use audio_util::Waveform;
pub use error::{AudioError, EqError};
pub use services::config::AppConfig;
