//! Waveform ingestion: WAV decoding, channel mixing and range clamping.
//!
//! The detection engine works on **mono `f32` samples in `[-1, 1]`**.  This
//! module provides the conversion steps:
//!
//! 1. [`read_wav`]: decode a WAV file with `hound`, scaling integer PCM by
//!    its bit depth.
//! 2. [`stereo_to_mono`]: downmix any number of interleaved channels.
//! 3. [`clamp_samples`]: clamp out-of-range values in place.

use std::path::Path;

use thiserror::Error;

/// Errors raised while loading audio.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read WAV file {path}: {source}")]
    Wav {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("unsupported WAV format: {bits}-bit {format:?}")]
    UnsupportedFormat {
        bits: u16,
        format: hound::SampleFormat,
    },
}

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input is returned as an owned `Vec`.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use voice_quality::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// clamp_samples
// ---------------------------------------------------------------------------

/// Clamp every sample to `[-1, 1]` in place; NaN becomes `0.0`.
///
/// Returns the number of samples that were modified.
pub fn clamp_samples(samples: &mut [f32]) -> usize {
    let mut clamped = 0;
    for s in samples.iter_mut() {
        if s.is_nan() {
            *s = 0.0;
            clamped += 1;
        } else if *s > 1.0 || *s < -1.0 {
            *s = s.clamp(-1.0, 1.0);
            clamped += 1;
        }
    }
    clamped
}

// ---------------------------------------------------------------------------
// read_wav
// ---------------------------------------------------------------------------

/// Decode `path` into mono samples in `[-1, 1]` and its sample rate.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), IngestError> {
    let wav_err = |source| IngestError::Wav {
        path: path.display().to_string(),
        source,
    };

    let reader = hound::WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        (hound::SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1_i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_err)?
        }
        (format, bits) => return Err(IngestError::UnsupportedFormat { bits, format }),
    };

    let mut mono = stereo_to_mono(&interleaved, spec.channels);
    let clamped = clamp_samples(&mut mono);
    if clamped > 0 {
        log::warn!("ingest: clamped {clamped} out-of-range samples");
    }

    log::debug!(
        "ingest: {} → {} samples @ {} Hz ({} ch)",
        path.display(),
        mono.len(),
        spec.sample_rate,
        spec.channels
    );
    Ok((mono, spec.sample_rate))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
