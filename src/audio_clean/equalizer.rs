//! Band-split equalizer
//!
//! normalize → split into bands → per-band gain → sum. The sum is not
//! renormalized, so boosted bands can push the mix past the normalized peak.
//! Anything beyond the i16 range saturates.

use crate::audio_util::{saturate_i16, Waveform};
use crate::error::{AudioError, EqError};

use super::filters::BandLimiter;
use super::presets::{BandGain, BandLayout, IntensityPreset, PresetCatalog};

/// Scale a waveform so its peak reaches `i16::MAX`.
///
/// Linear gain only, so relative dynamics are kept. Silent input is returned
/// unchanged.
pub fn normalize(waveform: &Waveform) -> Result<Waveform, AudioError> {
    let peak = waveform.peak();
    if peak == 0 {
        return Ok(waveform.clone());
    }

    let gain = i16::MAX as f32 / peak as f32;
    let samples = waveform
        .samples()
        .iter()
        .map(|s| saturate_i16(*s as f32 * gain))
        .collect();

    Waveform::new(samples, waveform.sample_rate(), waveform.channels())
}

/// One band of the normalized signal after filtering and gain
#[derive(Debug, Clone)]
pub struct BandSignal {
    pub band: BandGain,
    /// One buffer per channel
    pub channels: Vec<Vec<f32>>,
}

impl BandSignal {
    /// Sum of squared samples over all channels
    pub fn energy(&self) -> f64 {
        self.channels
            .iter()
            .flatten()
            .map(|s| (*s as f64) * (*s as f64))
            .sum()
    }
}

/// Multi-band equalizer driven by a preset catalog
#[derive(Debug, Clone, Default)]
pub struct BandSplitEqualizer {
    catalog: PresetCatalog,
}

impl BandSplitEqualizer {
    pub fn new(catalog: PresetCatalog) -> Self {
        Self { catalog }
    }

    pub fn with_layout(layout: BandLayout) -> Self {
        Self::new(PresetCatalog::builtin(layout))
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    /// Equalize `waveform` with the named preset
    pub fn equalize(&self, waveform: &Waveform, preset: &str) -> Result<Waveform, EqError> {
        let bands = self.split(waveform, preset)?;

        let channel_count = waveform.channels() as usize;
        let mut mix = vec![vec![0.0f32; waveform.frames()]; channel_count];

        for band in &bands {
            for (out, signal) in mix.iter_mut().zip(&band.channels) {
                for (o, s) in out.iter_mut().zip(signal) {
                    *o += s;
                }
            }
        }

        Ok(Waveform::from_channels(&mix, waveform.sample_rate())?)
    }

    /// Normalize, filter and gain every band of the preset without mixing
    pub fn split(&self, waveform: &Waveform, preset: &str) -> Result<Vec<BandSignal>, EqError> {
        let preset = self.catalog.get(preset)?;
        waveform.ensure_non_empty()?;

        let normalized = normalize(waveform)?;
        let channels = normalized.deinterleave();

        log::debug!(
            "Equalizing {} frames with preset '{}' ({} bands, peak {} -> {})",
            waveform.frames(),
            preset.name,
            preset.bands.len(),
            waveform.peak(),
            normalized.peak()
        );

        Ok(render_bands(preset, &channels, waveform.sample_rate() as f32))
    }
}

fn render_bands(preset: &IntensityPreset, channels: &[Vec<f32>], sample_rate: f32) -> Vec<BandSignal> {
    preset
        .bands
        .iter()
        .map(|band| {
            let limiter = BandLimiter::new(sample_rate, band.band.low_hz, band.band.high_hz);
            let gain = band.linear_gain();

            log::debug!("Band {}: {:+} dB", band.band, band.gain_db);

            let channels = channels
                .iter()
                .map(|input| {
                    let mut filtered = input.clone();
                    limiter.process(&mut filtered);
                    for sample in filtered.iter_mut() {
                        *sample *= gain;
                    }
                    filtered
                })
                .collect();

            BandSignal {
                band: *band,
                channels,
            }
        })
        .collect()
}
