//! Frame segmentation.
//!
//! [`FrameSource`] slices a mono waveform into overlapping fixed-length
//! windows.  Frame `i` starts at sample `i * hop` and spans `frame_len`
//! samples:
//!
//! ```text
//! start_time = i * hop / sample_rate
//! end_time   = start_time + frame_len / sample_rate
//! ```
//!
//! A trailing partial frame (fewer than `frame_len` samples left) is dropped,
//! so every frame handed to feature extraction has the same length and no
//! zero padding is ever introduced at the edges.
//!
//! # Example
//!
//! ```rust
//! use voice_quality::audio::FrameSource;
//!
//! let samples = vec![0.0_f32; 1_000];
//! // 400-sample frames (25 ms), 160-sample hop (10 ms) at 16 kHz
//! let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
//!
//! assert_eq!(source.len(), 4); // starts at 0, 160, 320, 480
//! let last = source.frames().last().unwrap();
//! assert!((last.start_time - 0.03).abs() < 1e-9);
//! ```

use thiserror::Error;

use crate::config::FrameConfig;

// ---------------------------------------------------------------------------
// FrameError
// ---------------------------------------------------------------------------

/// Invalid framing parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// The sample rate is zero.
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    /// The frame length rounds to zero samples.
    #[error("frame length must be at least one sample (got {secs}s at {sample_rate} Hz)")]
    ZeroFrameLength { secs: f64, sample_rate: u32 },

    /// The hop rounds to zero samples.
    #[error("hop must be at least one sample (got {secs}s at {sample_rate} Hz)")]
    ZeroHop { secs: f64, sample_rate: u32 },
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A time-stamped window of consecutive samples.
///
/// Frames borrow their samples from the buffer they were cut from; they are
/// consumed by feature extraction and never stored by the detectors.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Mono samples, nominally in `[-1.0, 1.0]`.
    pub samples: &'a [f32],
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// Position of the first sample, in seconds from the stream start.
    pub start_time: f64,
    /// `start_time + samples.len() / sample_rate`.
    pub end_time: f64,
}

impl<'a> Frame<'a> {
    /// Build the `index`-th frame of a stream framed with `hop` samples.
    pub fn at_index(samples: &'a [f32], sample_rate: u32, index: usize, hop: usize) -> Self {
        let start_time = (index * hop) as f64 / sample_rate as f64;
        Self {
            samples,
            sample_rate,
            start_time,
            end_time: start_time + samples.len() as f64 / sample_rate as f64,
        }
    }

    /// Duration of the frame in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

// ---------------------------------------------------------------------------
// FrameLayout
// ---------------------------------------------------------------------------

/// Frame length and hop resolved to sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Samples per frame.
    pub frame_len: usize,
    /// Samples between consecutive frame starts.
    pub hop: usize,
}

impl FrameLayout {
    /// Convert a [`FrameConfig`] (seconds) into sample counts at
    /// `sample_rate`, rounding to the nearest sample.
    pub fn from_config(config: &FrameConfig, sample_rate: u32) -> Result<Self, FrameError> {
        if sample_rate == 0 {
            return Err(FrameError::ZeroSampleRate);
        }
        let frame_len = (config.frame_length_secs * sample_rate as f64).round();
        let hop = (config.hop_secs * sample_rate as f64).round();

        if !(frame_len >= 1.0) {
            return Err(FrameError::ZeroFrameLength {
                secs: config.frame_length_secs,
                sample_rate,
            });
        }
        if !(hop >= 1.0) {
            return Err(FrameError::ZeroHop {
                secs: config.hop_secs,
                sample_rate,
            });
        }

        Ok(Self {
            frame_len: frame_len as usize,
            hop: hop as usize,
        })
    }

    /// Number of complete frames that fit into `total_samples`.
    pub fn frame_count(&self, total_samples: usize) -> usize {
        if total_samples < self.frame_len {
            0
        } else {
            (total_samples - self.frame_len) / self.hop + 1
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// Restartable frame producer over a borrowed waveform.
#[derive(Debug, Clone, Copy)]
pub struct FrameSource<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    layout: FrameLayout,
}

impl<'a> FrameSource<'a> {
    /// Create a source with explicit frame length and hop in samples.
    pub fn new(
        samples: &'a [f32],
        sample_rate: u32,
        frame_len: usize,
        hop: usize,
    ) -> Result<Self, FrameError> {
        if sample_rate == 0 {
            return Err(FrameError::ZeroSampleRate);
        }
        if frame_len == 0 {
            return Err(FrameError::ZeroFrameLength {
                secs: 0.0,
                sample_rate,
            });
        }
        if hop == 0 {
            return Err(FrameError::ZeroHop {
                secs: 0.0,
                sample_rate,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            layout: FrameLayout { frame_len, hop },
        })
    }

    /// Create a source from a [`FrameConfig`] expressed in seconds.
    pub fn from_config(
        samples: &'a [f32],
        sample_rate: u32,
        config: &FrameConfig,
    ) -> Result<Self, FrameError> {
        let layout = FrameLayout::from_config(config, sample_rate)?;
        Self::new(samples, sample_rate, layout.frame_len, layout.hop)
    }

    /// Frame length and hop in samples.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Number of frames [`frames`](Self::frames) will yield.
    pub fn len(&self) -> usize {
        self.layout.frame_count(self.samples.len())
    }

    /// Returns `true` when the waveform is shorter than one frame.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration of the whole waveform in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Iterate over the frames from the start of the waveform.
    ///
    /// Each call starts a fresh pass; the source itself holds no cursor.
    pub fn frames(&self) -> Frames<'a> {
        Frames {
            samples: self.samples,
            sample_rate: self.sample_rate,
            layout: self.layout,
            index: 0,
            count: self.len(),
        }
    }
}

impl<'a> IntoIterator for &FrameSource<'a> {
    type Item = Frame<'a>;
    type IntoIter = Frames<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames()
    }
}

/// Iterator returned by [`FrameSource::frames`].
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    layout: FrameLayout,
    index: usize,
    count: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let start = self.index * self.layout.hop;
        let window = &self.samples[start..start + self.layout.frame_len];
        let frame = Frame::at_index(window, self.sample_rate, self.index, self.layout.hop);
        self.index += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_drops_partial_tail() {
        let samples = vec![0.0_f32; 1_000];
        let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
        // Starts at 0, 160, 320, 480; 640 + 400 > 1000
        assert_eq!(source.len(), 4);
        assert_eq!(source.frames().count(), 4);
        for frame in source.frames() {
            assert_eq!(frame.samples.len(), 400);
        }
    }

    #[test]
    fn shorter_than_one_frame_yields_nothing() {
        let samples = vec![0.0_f32; 399];
        let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
        assert!(source.is_empty());
        assert_eq!(source.frames().next().map(|f| f.start_time), None);
    }

    #[test]
    fn start_times_are_monotonic_and_evenly_spaced() {
        let samples = vec![0.1_f32; 16_000 * 2];
        let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
        let starts: Vec<f64> = source.frames().map(|f| f.start_time).collect();

        assert_eq!(starts[0], 0.0);
        for pair in starts.windows(2) {
            let step = pair[1] - pair[0];
            assert!(step > 0.0);
            assert!((step - 0.01).abs() < 1e-9, "step = {step}");
        }
        // The frames cover the waveform up to the dropped tail.
        let last = source.frames().last().unwrap();
        assert!(last.end_time <= source.duration_secs() + 1e-12);
        assert!(source.duration_secs() - last.end_time < 0.01);
    }

    #[test]
    fn frame_times_follow_index_formula() {
        let samples: Vec<f32> = (0..2_000).map(|i| i as f32).collect();
        let source = FrameSource::new(&samples, 8_000, 200, 80).unwrap();
        let frame = source.frames().nth(3).unwrap();

        assert_eq!(frame.samples[0], 240.0);
        assert!((frame.start_time - 240.0 / 8_000.0).abs() < 1e-12);
        assert!((frame.end_time - 440.0 / 8_000.0).abs() < 1e-12);
        assert!((frame.duration() - 0.025).abs() < 1e-12);
    }

    #[test]
    fn frames_are_restartable() {
        let samples = vec![0.2_f32; 4_000];
        let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
        let first: Vec<f64> = source.frames().map(|f| f.start_time).collect();
        let second: Vec<f64> = (&source).into_iter().map(|f| f.start_time).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn layout_from_default_config() {
        let layout = FrameLayout::from_config(&FrameConfig::default(), 16_000).unwrap();
        assert_eq!(layout.frame_len, 400);
        assert_eq!(layout.hop, 160);
    }

    #[test]
    fn invalid_parameters_rejected() {
        let samples = vec![0.0_f32; 10];
        assert_eq!(
            FrameSource::new(&samples, 0, 4, 2).unwrap_err(),
            FrameError::ZeroSampleRate
        );
        assert!(matches!(
            FrameSource::new(&samples, 16_000, 0, 2).unwrap_err(),
            FrameError::ZeroFrameLength { .. }
        ));

        let config = FrameConfig {
            frame_length_secs: 0.025,
            hop_secs: 0.0,
        };
        let err = FrameLayout::from_config(&config, 16_000).unwrap_err();
        assert!(matches!(err, FrameError::ZeroHop { .. }), "{err}");
    }
}
