//! Spectral noise suppression using FFT-based Wiener filtering
//!
//! The noise profile is estimated from the quietest frames of the signal
//! itself, then every STFT frame is attenuated bin-by-bin by its estimated
//! noise share and resynthesised with weighted overlap-add.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::audio_util::Waveform;
use crate::error::AudioError;

const MIN_FFT_SIZE: usize = 64;

/// Settings for the noise reduction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseReductionSettings {
    /// FFT size in samples (rounded down to a multiple of 4, minimum 64)
    pub fft_size: usize,
    /// How far above the estimated noise floor to suppress (0-24 dB)
    pub reduction_db: f32,
    /// Minimum spectral gain, keeps bins from going fully silent
    pub gain_floor: f32,
    /// Share of frames, quietest first, used for the noise profile
    pub quiet_fraction: f32,
}

impl Default for NoiseReductionSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            reduction_db: 12.0,
            gain_floor: 0.02,
            quiet_fraction: 0.1,
        }
    }
}

/// FFT-based spectral denoiser for a single channel
pub struct SpectralDenoiser {
    fft_size: usize,
    hop_size: usize,
    noise_profile: Vec<f32>,
    reduction_db: f32,
    gain_floor: f32,
    quiet_fraction: f32,
    forward_fft: Arc<dyn RealToComplex<f32>>,
    inverse_fft: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
}

impl SpectralDenoiser {
    pub fn new(settings: &NoiseReductionSettings) -> Self {
        let fft_size = settings.fft_size.max(MIN_FFT_SIZE) / 4 * 4;
        let hop_size = fft_size / 4; // 75% overlap

        let mut planner = RealFftPlanner::<f32>::new();
        let forward_fft = planner.plan_fft_forward(fft_size);
        let inverse_fft = planner.plan_fft_inverse(fft_size);

        // Periodic Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        Self {
            fft_size,
            hop_size,
            noise_profile: vec![0.0; fft_size / 2 + 1],
            reduction_db: settings.reduction_db,
            gain_floor: settings.gain_floor.clamp(0.0, 1.0),
            quiet_fraction: settings.quiet_fraction.clamp(0.0, 1.0),
            forward_fft,
            inverse_fft,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn noise_profile(&self) -> &[f32] {
        &self.noise_profile
    }

    /// Estimate the noise profile from the lowest-energy frames of `samples`
    pub fn estimate_noise_profile(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        let mut frame_energies: Vec<(usize, f32)> = Vec::new();

        let mut pos = 0;
        while pos + self.fft_size <= samples.len() {
            let frame = &samples[pos..pos + self.fft_size];
            let energy: f32 = frame.iter().map(|s| s * s).sum();
            frame_energies.push((pos, energy));
            pos += self.hop_size;
        }

        if frame_energies.is_empty() {
            return Ok(());
        }

        // Stable sort keeps ties in time order, so the profile is reproducible
        frame_energies.sort_by(|a, b| a.1.total_cmp(&b.1));
        let quiet_count = ((frame_energies.len() as f32 * self.quiet_fraction).ceil() as usize)
            .clamp(1, frame_energies.len());

        let mut spectrum_sum = vec![0.0f32; self.fft_size / 2 + 1];
        let mut buffer = self.forward_fft.make_input_vec();
        let mut spectrum = self.forward_fft.make_output_vec();

        for &(start, _) in frame_energies.iter().take(quiet_count) {
            let frame = &samples[start..start + self.fft_size];
            for ((b, s), w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *b = s * w;
            }

            self.forward_fft
                .process(&mut buffer, &mut spectrum)
                .map_err(|e| AudioError::Spectral(e.to_string()))?;

            for (sum, c) in spectrum_sum.iter_mut().zip(&spectrum) {
                *sum += c.norm();
            }
        }

        for (profile, sum) in self.noise_profile.iter_mut().zip(&spectrum_sum) {
            *profile = sum / quiet_count as f32;
        }

        log::debug!(
            "Noise profile from {} of {} frames (fft {})",
            quiet_count,
            frame_energies.len(),
            self.fft_size
        );

        Ok(())
    }

    /// Process audio through the spectral denoiser
    ///
    /// Applies Wiener filtering: gain = max(floor, 1 - noise/signal).
    /// Buffers shorter than one FFT frame are left untouched.
    pub fn process(&self, samples: &mut [f32]) -> Result<(), AudioError> {
        if samples.len() < self.fft_size {
            return Ok(());
        }

        let reduction_factor = 10.0_f32.powf(self.reduction_db / 20.0);

        // Zero padding on both sides gives every real sample full frame coverage
        let pad = self.fft_size;
        let mut padded = vec![0.0f32; pad + samples.len() + pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut output = vec![0.0f32; padded.len()];
        let mut window_sum = vec![0.0f32; padded.len()];

        let mut buffer = self.forward_fft.make_input_vec();
        let mut spectrum = self.forward_fft.make_output_vec();
        let mut time_buffer = self.inverse_fft.make_output_vec();
        let norm = 1.0 / self.fft_size as f32;

        let mut pos = 0;
        while pos + self.fft_size <= padded.len() {
            for ((b, s), w) in buffer
                .iter_mut()
                .zip(&padded[pos..pos + self.fft_size])
                .zip(&self.window)
            {
                *b = s * w;
            }

            self.forward_fft
                .process(&mut buffer, &mut spectrum)
                .map_err(|e| AudioError::Spectral(e.to_string()))?;

            for (c, noise) in spectrum.iter_mut().zip(&self.noise_profile) {
                let signal_mag = c.norm();
                let noise_mag = noise * reduction_factor;

                let gain = if signal_mag > 0.0 {
                    let snr = signal_mag / (noise_mag + 1e-10);
                    ((snr - 1.0) / snr).max(self.gain_floor)
                } else {
                    self.gain_floor
                };

                *c = *c * gain;
            }

            self.inverse_fft
                .process(&mut spectrum, &mut time_buffer)
                .map_err(|e| AudioError::Spectral(e.to_string()))?;

            for (i, sample) in time_buffer.iter().enumerate() {
                output[pos + i] += sample * norm * self.window[i];
                window_sum[pos + i] += self.window[i] * self.window[i];
            }

            pos += self.hop_size;
        }

        // Overlap-add normalization
        for (i, sample) in samples.iter_mut().enumerate() {
            let j = pad + i;
            if window_sum[j] > 0.001 {
                *sample = output[j] / window_sum[j];
            }
        }

        Ok(())
    }
}

/// Signal-driven noise reduction over whole waveforms.
///
/// Channels are denoised independently with their own noise profile.
#[derive(Debug, Clone, Default)]
pub struct NoiseReducer {
    settings: NoiseReductionSettings,
}

impl NoiseReducer {
    pub fn new(settings: NoiseReductionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NoiseReductionSettings {
        &self.settings
    }

    /// Return a denoised copy of `waveform` with the same length and layout
    pub fn reduce(&self, waveform: &Waveform) -> Result<Waveform, AudioError> {
        waveform.ensure_non_empty()?;

        let mut channels = waveform.deinterleave();
        for channel in channels.iter_mut() {
            let mut denoiser = SpectralDenoiser::new(&self.settings);
            denoiser.estimate_noise_profile(channel)?;
            denoiser.process(channel)?;
        }

        log::debug!(
            "Denoised {} channel(s), {} frames at {} Hz ({} dB)",
            waveform.channels(),
            waveform.frames(),
            waveform.sample_rate(),
            self.settings.reduction_db
        );

        Waveform::from_channels(&channels, waveform.sample_rate())
    }

    /// Denoise raw interleaved samples
    pub fn reduce_samples(
        &self,
        samples: &[i16],
        sample_rate: u32,
        channels: u16,
    ) -> Result<Vec<i16>, AudioError> {
        let waveform = Waveform::new(samples.to_vec(), sample_rate, channels)?;
        Ok(self.reduce(&waveform)?.into_samples())
    }
}
