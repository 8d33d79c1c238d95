//! Incremental analysis of audio that arrives in chunks.
//!
//! [`FrameAssembler`] re-frames arbitrarily sized chunks into the exact frame
//! sequence [`FrameSource`](crate::audio::FrameSource) would produce for the
//! concatenated waveform, so a streamed analysis gives the same result as a
//! batch one.  [`analyze_stream`] drives an [`Analyzer`] from a
//! `tokio::sync::mpsc` channel until the sender side is dropped.
//!
//! ```text
//! producer ──Vec<f32>──▶ mpsc ──▶ analyze_stream
//!                                   └─▶ FrameAssembler::push
//!                                         └─▶ AnalysisSession::process × frames
//!                                   └─▶ (channel closed) AnalysisSession::finish
//! ```

use tokio::sync::mpsc;

use crate::audio::frame::{Frame, FrameLayout};
use crate::pipeline::result::AnalysisResult;
use crate::pipeline::runner::{AnalysisError, Analyzer};

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Buffers incoming samples and emits complete frames in time order.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    layout: FrameLayout,
    sample_rate: u32,
    /// Samples starting at the next frame's first sample.
    pending: Vec<f32>,
    /// Samples still to discard when the hop is longer than a frame.
    skip: usize,
    next_index: usize,
    total_samples: usize,
}

impl FrameAssembler {
    pub fn new(layout: FrameLayout, sample_rate: u32) -> Self {
        Self {
            layout,
            sample_rate,
            pending: Vec::with_capacity(layout.frame_len * 2),
            skip: 0,
            next_index: 0,
            total_samples: 0,
        }
    }

    /// Append `chunk` and call `on_frame` for every frame it completes.
    pub fn push<F>(&mut self, chunk: &[f32], mut on_frame: F)
    where
        F: FnMut(&Frame<'_>),
    {
        self.total_samples += chunk.len();

        let dropped = self.skip.min(chunk.len());
        self.skip -= dropped;
        self.pending.extend_from_slice(&chunk[dropped..]);

        let FrameLayout { frame_len, hop } = self.layout;
        let mut offset = 0;
        while offset + frame_len <= self.pending.len() {
            let frame = Frame::at_index(
                &self.pending[offset..offset + frame_len],
                self.sample_rate,
                self.next_index,
                hop,
            );
            on_frame(&frame);
            self.next_index += 1;
            offset += hop;
        }

        if offset <= self.pending.len() {
            self.pending.drain(..offset);
        } else {
            self.skip = offset - self.pending.len();
            self.pending.clear();
        }
    }

    /// Frames emitted so far.
    pub fn frame_count(&self) -> usize {
        self.next_index
    }

    /// Samples received so far.
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Duration of everything received so far, in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.total_samples as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// analyze_stream
// ---------------------------------------------------------------------------

/// Analyze mono chunks received on `rx` until the channel closes.
///
/// Chunks may have any length, including zero.  Closing the channel early
/// yields the result for the audio received up to that point.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use voice_quality::calibration::BaselineProfile;
/// use voice_quality::config::AnalyzerConfig;
/// use voice_quality::pipeline::{analyze_stream, Analyzer};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let baseline = BaselineProfile::load_from("mic.json".as_ref())?;
///     let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
///         .baseline(Arc::new(baseline))
///         .build()?;
///
///     let (tx, rx) = mpsc::channel::<Vec<f32>>(16);
///     tokio::spawn(async move {
///         // forward capture buffers here
///         let _ = tx.send(vec![0.0; 1_600]).await;
///     });
///
///     let result = analyze_stream(&mut analyzer, 16_000, rx).await?;
///     println!("{result}");
///     Ok(())
/// }
/// ```
pub async fn analyze_stream(
    analyzer: &mut Analyzer,
    sample_rate: u32,
    mut rx: mpsc::Receiver<Vec<f32>>,
) -> Result<AnalysisResult, AnalysisError> {
    let layout = analyzer.frame_layout(sample_rate)?;
    let mut assembler = FrameAssembler::new(layout, sample_rate);
    let mut session = analyzer.session(sample_rate)?;

    while let Some(chunk) = rx.recv().await {
        assembler.push(&chunk, |frame| session.process(frame));
    }

    log::debug!(
        "stream: channel closed after {} samples ({} frames)",
        assembler.total_samples(),
        assembler.frame_count()
    );
    Ok(session.finish(assembler.duration_secs()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::frame::FrameSource;
    use crate::calibration::Calibrator;
    use crate::config::AnalyzerConfig;
    use crate::detect::EventKind;

    fn tone(secs: f64, amplitude: f32) -> Vec<f32> {
        let n = (secs * 16_000.0) as usize;
        (0..n)
            .map(|i| {
                let phase = (i % 80) as f32 / 80.0;
                amplitude * (2.0 * std::f32::consts::PI * phase).sin()
            })
            .collect()
    }

    fn analyzer() -> Analyzer {
        let config = AnalyzerConfig::default();
        let baseline = Calibrator::new(&config)
            .calibrate(&tone(5.0, 0.3), 16_000)
            .unwrap();
        Analyzer::builder(config)
            .baseline(Arc::new(baseline))
            .build()
            .unwrap()
    }

    fn collect(
        assembler: &mut FrameAssembler,
        samples: &[f32],
        sizes: &[usize],
    ) -> Vec<(f64, Vec<f32>)> {
        let mut frames = Vec::new();
        let mut rest = samples;
        let mut sizes = sizes.iter().cycle();
        while !rest.is_empty() {
            let n = (*sizes.next().unwrap()).min(rest.len());
            let (chunk, tail) = rest.split_at(n);
            assembler.push(chunk, |f| frames.push((f.start_time, f.samples.to_vec())));
            rest = tail;
        }
        frames
    }

    fn batch(source: &FrameSource<'_>) -> Vec<(f64, Vec<f32>)> {
        source
            .frames()
            .map(|f| (f.start_time, f.samples.to_vec()))
            .collect()
    }

    #[test]
    fn odd_chunks_reproduce_batch_frames() {
        let samples: Vec<f32> = (0..5_000).map(|i| i as f32).collect();
        let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();

        let mut assembler = FrameAssembler::new(source.layout(), 16_000);
        let frames = collect(&mut assembler, &samples, &[1, 399, 7, 0, 1_000, 13]);

        assert_eq!(frames, batch(&source));
        assert_eq!(assembler.frame_count(), source.len());
        assert_eq!(assembler.total_samples(), 5_000);
        assert!((assembler.duration_secs() - source.duration_secs()).abs() < 1e-12);
    }

    #[test]
    fn hop_longer_than_frame_skips_samples() {
        let samples: Vec<f32> = (0..2_000).map(|i| i as f32).collect();
        let source = FrameSource::new(&samples, 8_000, 100, 250).unwrap();

        let mut assembler = FrameAssembler::new(source.layout(), 8_000);
        let frames = collect(&mut assembler, &samples, &[30, 170]);

        assert_eq!(frames, batch(&source));
        assert_eq!(frames[1].1[0], 250.0);
    }

    #[test]
    fn short_push_after_long_hop_carries_the_skip() {
        let samples: Vec<f32> = (0..3_000).map(|i| i as f32 * 0.001).collect();
        let source = FrameSource::new(&samples, 16_000, 400, 500).unwrap();

        let mut assembler = FrameAssembler::new(source.layout(), 16_000);
        let frames = collect(&mut assembler, &samples, &[450, 20, 30, 900]);

        assert_eq!(frames, batch(&source));
        assert_eq!(frames[1].1[0], samples[500]);
        assert_eq!(assembler.total_samples(), 3_000);
    }

    #[tokio::test]
    async fn chunked_stream_matches_batch() {
        let mut analyzer = analyzer();
        let mut input = tone(2.0, 0.3);
        input[12_345] = 1.0;
        let expected = analyzer.analyze(&input, 16_000).unwrap();

        let (tx, rx) = mpsc::channel(4);
        let chunks: Vec<Vec<f32>> = input.chunks(333).map(<[f32]>::to_vec).collect();
        tokio::spawn(async move {
            for chunk in chunks {
                tx.send(chunk).await.unwrap();
            }
        });

        let streamed = analyze_stream(&mut analyzer, 16_000, rx).await.unwrap();
        assert_eq!(streamed, expected);
        assert_eq!(streamed.count(EventKind::VoiceDistortion), 1);
    }

    #[tokio::test]
    async fn closed_channel_yields_partial_result() {
        let mut analyzer = analyzer();
        let (tx, rx) = mpsc::channel(4);
        tx.send(tone(1.0, 0.3)).await.unwrap();
        drop(tx);

        let result = analyze_stream(&mut analyzer, 16_000, rx).await.unwrap();
        // (16000 − 400) / 160 + 1
        assert_eq!(result.frame_count(), 98);
        assert!((result.total_duration() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejects_mismatched_rate_before_reading() {
        let mut analyzer = analyzer();
        let (_tx, rx) = mpsc::channel::<Vec<f32>>(1);
        let err = analyze_stream(&mut analyzer, 44_100, rx).await.unwrap_err();
        assert!(matches!(err, AnalysisError::SampleRateMismatch { .. }));
    }
}
