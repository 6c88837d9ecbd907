//! Audio enhancement module
//!
//! Processing stages for the soundtrack of a video:
//! 1. Spectral noise suppression (FFT-based Wiener filter)
//! 2. Band-split equalization with intensity presets
//! 3. Pipeline orchestration around the external media tools

pub mod equalizer;
pub mod filters;
pub mod pipeline;
pub mod presets;
pub mod spectral;

pub use equalizer::{normalize, BandSignal, BandSplitEqualizer};
pub use filters::BandLimiter;
pub use pipeline::{
    ArtifactKind, Pipeline, PipelineError, PipelineOptions, PipelineResult, Stage, StageError,
};
pub use presets::{
    BandDefinition, BandGain, BandLayout, Intensity, IntensityPreset, PresetCatalog,
};
pub use spectral::{NoiseReducer, NoiseReductionSettings, SpectralDenoiser};
