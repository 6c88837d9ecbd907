use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AudioError;

/// Interleaved 16-bit PCM audio tagged with its sample rate and channel count.
///
/// Every stage takes a `&Waveform` and hands back a new one, so a buffer is
/// never mutated after it has been passed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    /// Wrap interleaved samples, checking the layout invariants
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidAudio(
                "sample rate must be positive".to_string(),
            ));
        }
        if channels == 0 {
            return Err(AudioError::InvalidAudio(
                "channel count must be positive".to_string(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidAudio(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Rebuild an interleaved waveform from per-channel buffers.
    ///
    /// Values are rounded and saturated to the i16 range.
    pub fn from_channels(channels: &[Vec<f32>], sample_rate: u32) -> Result<Self, AudioError> {
        let channel_count = u16::try_from(channels.len())
            .map_err(|_| AudioError::InvalidAudio("too many channels".to_string()))?;
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);

        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::InvalidAudio(
                "channel buffers differ in length".to_string(),
            ));
        }

        let mut samples = Vec::with_capacity(frames * channels.len());
        for i in 0..frames {
            for channel in channels {
                samples.push(saturate_i16(channel[i]));
            }
        }

        Self::new(samples, sample_rate, channel_count)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of multi-channel frames
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value (32768 for a full-scale negative sample)
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    pub fn ensure_non_empty(&self) -> Result<(), AudioError> {
        if self.is_empty() {
            return Err(AudioError::InvalidAudio("waveform is empty".to_string()));
        }
        Ok(())
    }

    /// Split into one f32 buffer per channel, keeping the i16 scale
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let channels = self.channels as usize;
        let mut out = vec![Vec::with_capacity(self.frames()); channels];

        for frame in self.samples.chunks_exact(channels) {
            for (buffer, sample) in out.iter_mut().zip(frame) {
                buffer.push(*sample as f32);
            }
        }

        out
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Round to the nearest integer and clamp into the i16 range (no wraparound)
pub fn saturate_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Read a WAV file into a 16-bit waveform.
///
/// Integer formats are rescaled to 16 bits, float formats are scaled from
/// [-1.0, 1.0].
pub fn read_wav(path: &Path) -> Result<Waveform, AudioError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader.into_samples::<i16>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            let shift = bits as i32 - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| rescale_int(v, shift)))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| saturate_i16(v * i16::MAX as f32)))
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} at {} bits",
                format, bits
            )))
        }
    };

    Waveform::new(samples, spec.sample_rate, spec.channels)
}

fn rescale_int(value: i32, shift: i32) -> i16 {
    let scaled = if shift >= 0 {
        value >> shift
    } else {
        value << -shift
    };
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Write a waveform as a 16-bit PCM WAV file
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: waveform.channels(),
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in waveform.samples() {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    log::debug!(
        "Wrote {} frames ({:.2}s) to {:?}",
        waveform.frames(),
        waveform.duration_secs(),
        path
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_layout() {
        let result = Waveform::new(vec![0, 1, 2], 44100, 2);
        assert!(matches!(result, Err(AudioError::InvalidAudio(_))));
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let result = Waveform::new(vec![0, 1], 0, 1);
        assert!(matches!(result, Err(AudioError::InvalidAudio(_))));
    }

    #[test]
    fn test_deinterleave_and_rebuild() {
        let waveform = Waveform::new(vec![1, -1, 2, -2, 3, -3], 8000, 2).unwrap();
        let channels = waveform.deinterleave();
        assert_eq!(channels, vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]);

        let rebuilt = Waveform::from_channels(&channels, 8000).unwrap();
        assert_eq!(rebuilt, waveform);
    }

    #[test]
    fn test_from_channels_saturates() {
        let channels = vec![vec![40000.0, -40000.0, 12.4]];
        let waveform = Waveform::from_channels(&channels, 44100).unwrap();
        assert_eq!(waveform.samples(), &[i16::MAX, i16::MIN, 12]);
    }

    #[test]
    fn test_peak_handles_min_value() {
        let waveform = Waveform::new(vec![100, i16::MIN, 5], 44100, 1).unwrap();
        assert_eq!(waveform.peak(), 32768);
    }

    #[test]
    fn test_wav_round_trip_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<i16> = (0..4410)
            .flat_map(|i| {
                let v = ((i as f32 * 0.05).sin() * 10000.0) as i16;
                [v, -v]
            })
            .collect();
        let waveform = Waveform::new(samples, 44100, 2).unwrap();

        write_wav(&path, &waveform).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert_eq!(loaded, waveform);
        assert!((loaded.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_read_float_wav_scales_to_i16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");

        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for sample in [0.0f32, 0.5, -1.0, 1.5] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate(), 48000);
        assert_eq!(loaded.samples(), &[0, 16384, -32767, i16::MAX]);
    }
}
