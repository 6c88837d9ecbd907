//! IIR filters for band splitting
//!
//! Each cutoff is a 2nd-order Butterworth biquad run forward and then
//! backward over the buffer. The result is zero-phase with a 4th-order
//! magnitude slope, and a low-pass and high-pass sharing a cutoff sum flat.

use biquad::{Biquad, Coefficients, DirectForm1, Hertz, Type, Q_BUTTERWORTH_F32};

/// One cutoff of a band limiter
#[derive(Clone, Copy)]
enum Stage {
    Filter(Coefficients<f32>),
    /// Passes everything (no cutoff, or a low-pass at/above Nyquist)
    Bypass,
    /// Passes nothing (a high-pass at/above Nyquist, or a low-pass at/below 0 Hz)
    Mute,
}

/// Band limiter combining zero-phase high-pass and low-pass filters
#[derive(Clone, Copy)]
pub struct BandLimiter {
    highpass: Stage,
    lowpass: Stage,
}

impl BandLimiter {
    /// Create a band limiter for the given cutoffs.
    ///
    /// Cutoffs that cannot be realised at this sample rate degrade to a
    /// bypass or a muted band instead of failing.
    pub fn new(sample_rate: f32, highpass_freq: Option<f32>, lowpass_freq: Option<f32>) -> Self {
        let nyquist = sample_rate / 2.0;

        let highpass = match highpass_freq {
            None => Stage::Bypass,
            Some(freq) if freq.is_nan() || freq <= 0.0 => Stage::Bypass,
            Some(freq) if freq >= nyquist => {
                log::warn!(
                    "High-pass cutoff {} Hz is at or above Nyquist ({} Hz), band is silent",
                    freq,
                    nyquist
                );
                Stage::Mute
            }
            Some(freq) => design(Type::HighPass, sample_rate, freq),
        };

        let lowpass = match lowpass_freq {
            None => Stage::Bypass,
            Some(freq) if freq.is_nan() || freq <= 0.0 => Stage::Mute,
            Some(freq) if freq >= nyquist => Stage::Bypass,
            Some(freq) => design(Type::LowPass, sample_rate, freq),
        };

        Self { highpass, lowpass }
    }

    /// True when the band can never carry signal
    pub fn is_muted(&self) -> bool {
        matches!(self.highpass, Stage::Mute) || matches!(self.lowpass, Stage::Mute)
    }

    /// Filter samples in place (high-pass first, then low-pass)
    pub fn process(&self, samples: &mut [f32]) {
        if self.is_muted() {
            samples.fill(0.0);
            return;
        }

        for stage in [self.highpass, self.lowpass] {
            if let Stage::Filter(coeffs) = stage {
                filtfilt(coeffs, samples);
            }
        }
    }
}

fn design(filter: Type<f32>, sample_rate: f32, freq: f32) -> Stage {
    let coeffs = Hertz::<f32>::from_hz(sample_rate).and_then(|fs| {
        let f0 = Hertz::<f32>::from_hz(freq)?;
        Coefficients::<f32>::from_params(filter, fs, f0, Q_BUTTERWORTH_F32)
    });

    match coeffs {
        Ok(coeffs) => Stage::Filter(coeffs),
        Err(e) => {
            log::warn!("Failed to design filter at {} Hz: {:?}, muting band", freq, e);
            Stage::Mute
        }
    }
}

/// Run the biquad forward, then backward, cancelling its phase response
fn filtfilt(coeffs: Coefficients<f32>, samples: &mut [f32]) {
    let mut forward = DirectForm1::<f32>::new(coeffs);
    for sample in samples.iter_mut() {
        *sample = forward.run(*sample);
    }

    let mut backward = DirectForm1::<f32>::new(coeffs);
    for sample in samples.iter_mut().rev() {
        *sample = backward.run(*sample);
    }
}
