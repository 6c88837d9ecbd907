//! Enhancement pipeline orchestration
//!
//! extract → denoise → equalize → (optional) vertical crop + re-mux.
//! Every intermediate lives in a per-run scratch directory that is removed
//! when the run ends, whether it succeeded or not. Deliverables are copied
//! to the output directory only once every stage has succeeded.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::equalizer::BandSplitEqualizer;
use super::presets::{Intensity, PresetCatalog};
use super::spectral::{NoiseReducer, NoiseReductionSettings};
use crate::audio_util::write_wav;
use crate::error::{AudioError, EqError};
use crate::media::{
    AudioExtractor, ExtractionError, ExtractorKind, FfmpegTool, MuxError, SymphoniaExtractor,
    VideoMuxer,
};
use crate::services::config::AppConfig;
use crate::services::scratch::{ScratchError, ScratchSpace};

/// Options for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Preset name, looked up in the equalizer's catalog
    pub preset: String,
    /// Stop after equalization and return only the audio
    pub preview_audio_only: bool,
    /// Crop landscape video to 9:16 before muxing
    pub convert_vertical: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            preset: Intensity::default().name().to_string(),
            preview_audio_only: false,
            convert_vertical: false,
        }
    }
}

/// Intermediate and final files of a run, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    RawAudio,
    DenoisedAudio,
    EqualizedAudio,
    VerticalVideo,
    FinalVideo,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::RawAudio => "audio.wav",
            ArtifactKind::DenoisedAudio => "audio_clean.wav",
            ArtifactKind::EqualizedAudio => "audio_clean_eq.wav",
            ArtifactKind::VerticalVideo => "vertical.mp4",
            ArtifactKind::FinalVideo => "output.mp4",
        }
    }
}

/// Pipeline stage, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Scratch,
    Extraction,
    NoiseReduction,
    Equalization,
    VerticalCrop,
    Mux,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scratch => "scratch setup",
            Stage::Extraction => "audio extraction",
            Stage::NoiseReduction => "noise reduction",
            Stage::Equalization => "equalization",
            Stage::VerticalCrop => "vertical crop",
            Stage::Mux => "mux",
            Stage::Persist => "saving output",
        };
        f.write_str(name)
    }
}

/// Cause of a stage failure
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Equalizer(#[from] EqError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed run: the stage that failed and why
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T, E: Into<StageError>> StageContext<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            stage,
            source: e.into(),
        })
    }
}

/// Deliverables of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub run_id: String,
    /// Equalized audio as a WAV file in the output directory
    pub equalized_audio: PathBuf,
    /// Final video in the output directory, `None` in preview mode
    pub video: Option<PathBuf>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
}

/// Runs the enhancement chain over one video at a time.
///
/// Holds no per-run state, so one pipeline can serve concurrent runs.
pub struct Pipeline {
    extractor: Box<dyn AudioExtractor>,
    muxer: Box<dyn VideoMuxer>,
    reducer: NoiseReducer,
    equalizer: BandSplitEqualizer,
    scratch_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(extractor: impl AudioExtractor + 'static, muxer: impl VideoMuxer + 'static) -> Self {
        Self {
            extractor: Box::new(extractor),
            muxer: Box::new(muxer),
            reducer: NoiseReducer::default(),
            equalizer: BandSplitEqualizer::default(),
            scratch_root: None,
        }
    }

    /// Build the pipeline described by a config
    pub fn from_config(config: &AppConfig) -> Self {
        let ffmpeg = FfmpegTool::new(config.ffmpeg.clone());
        let extractor: Box<dyn AudioExtractor> = match config.extractor {
            ExtractorKind::Ffmpeg => Box::new(ffmpeg.clone()),
            ExtractorKind::Symphonia => Box::new(SymphoniaExtractor::new()),
        };

        Self {
            extractor,
            muxer: Box::new(ffmpeg),
            reducer: NoiseReducer::new(config.noise_reduction.clone()),
            equalizer: BandSplitEqualizer::new(config.catalog()),
            scratch_root: config.scratch_root.clone(),
        }
    }

    pub fn with_noise_reduction(mut self, settings: NoiseReductionSettings) -> Self {
        self.reducer = NoiseReducer::new(settings);
        self
    }

    pub fn with_catalog(mut self, catalog: PresetCatalog) -> Self {
        self.equalizer = BandSplitEqualizer::new(catalog);
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Enhance `video`, writing deliverables into `output_dir`
    pub fn run(
        &self,
        video: &Path,
        options: &PipelineOptions,
        output_dir: &Path,
    ) -> Result<PipelineResult, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        log::info!(
            "[{}] Processing {:?} (preset '{}', preview: {}, vertical: {})",
            run_id,
            video,
            options.preset,
            options.preview_audio_only,
            options.convert_vertical
        );

        let scratch =
            ScratchSpace::acquire(self.scratch_root.as_deref(), &run_id).stage(Stage::Scratch)?;

        let outcome = self.run_stages(&run_id, &scratch, video, options, output_dir);

        if let Err(e) = scratch.release() {
            log::warn!("[{}] {}", run_id, e);
        }

        match &outcome {
            Ok(result) => log::info!(
                "[{}] Done in {:.2}s: {:?}",
                run_id,
                started.elapsed().as_secs_f64(),
                result.video.as_ref().unwrap_or(&result.equalized_audio)
            ),
            Err(e) => log::error!("[{}] {}", run_id, e),
        }

        outcome
    }

    fn run_stages(
        &self,
        run_id: &str,
        scratch: &ScratchSpace,
        video: &Path,
        options: &PipelineOptions,
        output_dir: &Path,
    ) -> Result<PipelineResult, PipelineError> {
        // Stage 1: pull the audio track out of the container
        let raw_path = scratch.file(ArtifactKind::RawAudio.file_name());
        let raw = self
            .extractor
            .extract_audio(video, &raw_path)
            .stage(Stage::Extraction)?;

        // Stage 2: spectral noise reduction
        let clean_path = scratch.file(ArtifactKind::DenoisedAudio.file_name());
        let clean = self.reducer.reduce(&raw).stage(Stage::NoiseReduction)?;
        write_wav(&clean_path, &clean).stage(Stage::NoiseReduction)?;
        log::info!("[{}] Noise reduction complete", run_id);

        // Stage 3: band-split EQ
        let eq_path = scratch.file(ArtifactKind::EqualizedAudio.file_name());
        let equalized = self
            .equalizer
            .equalize(&clean, &options.preset)
            .stage(Stage::Equalization)?;
        write_wav(&eq_path, &equalized).stage(Stage::Equalization)?;
        log::info!("[{}] Equalization complete ('{}')", run_id, options.preset);

        // Stage 4: optional crop, then mux
        let final_video = if options.preview_audio_only {
            None
        } else {
            let source = if options.convert_vertical {
                self.muxer
                    .crop_to_vertical(video, &scratch.file(ArtifactKind::VerticalVideo.file_name()))
                    .stage(Stage::VerticalCrop)?
            } else {
                video.to_path_buf()
            };

            let output = scratch.file(ArtifactKind::FinalVideo.file_name());
            self.muxer
                .remux(&source, &eq_path, &output)
                .stage(Stage::Mux)?;
            Some(output)
        };

        let (equalized_audio, video_out) =
            persist(video, &eq_path, final_video.as_deref(), output_dir).stage(Stage::Persist)?;

        Ok(PipelineResult {
            run_id: run_id.to_string(),
            equalized_audio,
            video: video_out,
            sample_rate: equalized.sample_rate(),
            channels: equalized.channels(),
            duration_secs: equalized.duration_secs(),
        })
    }
}

/// Copy deliverables out of scratch. Nothing is left behind on failure.
fn persist(
    video: &Path,
    audio: &Path,
    final_video: Option<&Path>,
    output_dir: &Path,
) -> std::io::Result<(PathBuf, Option<PathBuf>)> {
    fs::create_dir_all(output_dir)?;

    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let audio_out = output_dir.join(format!("{}_enhanced.wav", stem));
    if let Err(e) = fs::copy(audio, &audio_out) {
        let _ = fs::remove_file(&audio_out);
        return Err(e);
    }

    let Some(final_video) = final_video else {
        return Ok((audio_out, None));
    };

    let video_out = output_dir.join(format!("{}_enhanced.mp4", stem));
    if let Err(e) = fs::copy(final_video, &video_out) {
        let _ = fs::remove_file(&video_out);
        let _ = fs::remove_file(&audio_out);
        return Err(e);
    }

    Ok((audio_out, Some(video_out)))
}
