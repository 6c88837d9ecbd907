//! In-process audio extraction with symphonia
//!
//! Demuxes the first audio track of a container (mp4/m4a, wav, mp3...) and
//! decodes it to 16-bit PCM at its native sample rate. Only the decoders
//! enabled in Cargo.toml are available.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioExtractor, ExtractionError};
use crate::audio_util::{write_wav, Waveform};

#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaExtractor;

impl SymphoniaExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Decode the first audio track of `path`
    pub fn decode(&self, path: &Path) -> Result<Waveform, ExtractionError> {
        let file = File::open(path).map_err(|e| ExtractionError::Decode(format!("Failed to open source: {}", e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();
        let decoder_opts = DecoderOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| ExtractionError::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| ExtractionError::NoAudioTrack(path.to_path_buf()))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0) as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|e| ExtractionError::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<i16> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(ExtractionError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::warn!("Skipping corrupt packet in {:?}: {}", path, msg);
                    continue;
                }
                Err(e) => return Err(ExtractionError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;

            let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if channels == 0 {
            return Err(ExtractionError::Decode(
                "audio track has no channel layout".to_string(),
            ));
        }

        Ok(Waveform::new(samples, sample_rate, channels)?)
    }
}

impl AudioExtractor for SymphoniaExtractor {
    fn extract_audio(&self, video: &Path, output: &Path) -> Result<Waveform, ExtractionError> {
        let waveform = self.decode(video)?;
        write_wav(output, &waveform)?;

        log::info!(
            "Decoded {:.2}s of audio ({} ch, {} Hz) from {:?}",
            waveform.duration_secs(),
            waveform.channels(),
            waveform.sample_rate(),
            video
        );

        Ok(waveform)
    }
}
