use std::sync::Arc;

use clap::ValueEnum;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::block::OutputBlock;
use crate::noise::NoiseWindow;

/// How the two overlapping reconstructions are combined.
///
/// With the periodic Hann window the two frame grids sum to exactly one, so
/// `Sum` is unity-gain. `Average` halves the result instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapNorm {
    Sum,
    Average,
}

/// Immutable spectral shaping parameters.
#[derive(Clone, Copy, Debug)]
pub struct FilterSpec {
    /// Decay coefficient of the `1 / (alpha * bin + 1)` attenuation curve.
    /// 0.0 passes white noise through; around 0.1 sounds pink-ish.
    pub alpha: f64,
    /// Bins up to and including this index are zeroed. Must be below the
    /// Nyquist bin; the configuration layer validates this before any
    /// producer starts.
    pub cutoff: usize,
    /// Post-filter linear scale, useful to compensate for low alpha values.
    pub gain: f64,
    pub overlap_norm: OverlapNorm,
    /// Zero the Nyquist bin as well.
    pub zero_nyquist: bool,
}

/// Per-channel transform scratch, reused across invocations so the producer
/// loop settles into a steady state without reallocating.
struct ChannelScratch {
    aligned: Vec<Complex<f64>>,
    shifted: Vec<Complex<f64>>,
}

impl ChannelScratch {
    fn new() -> Self {
        Self {
            aligned: Vec::new(),
            shifted: Vec::new(),
        }
    }
}

/// Windowed overlap-add spectral shaper.
///
/// One `NoiseWindow` in, one `OutputBlock` out. Two real-valued views of the
/// window are processed: the aligned view (the window itself) and the
/// shifted view (the window trimmed by half a segment at each end). Every
/// segment-sized frame of both views is Hann-windowed, transformed, shaped
/// by the per-bin gain curve, transformed back, and the two views are summed
/// sample-by-sample. Because the frame grids are offset by half a segment,
/// the window taper of one grid peaks where the other vanishes, cancelling
/// block-edge artifacts.
///
/// Filtering is deterministic given the window contents and the spec; no
/// state persists between calls beyond the scratch allocations.
pub struct SpectralFilter {
    spec: FilterSpec,
    size: usize,
    half: usize,
    window: Vec<f64>,
    /// Per-bin gain table, conjugate-symmetric so the inverse transform
    /// stays real.
    gains: Vec<f64>,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
    left: ChannelScratch,
    right: ChannelScratch,
}

impl SpectralFilter {
    pub fn new(spec: FilterSpec, segment_size: usize) -> Self {
        debug_assert!(segment_size >= 2 && segment_size % 2 == 0);
        debug_assert!(spec.cutoff < segment_size / 2);

        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(segment_size);
        let fft_inverse = planner.plan_fft_inverse(segment_size);

        Self {
            spec,
            size: segment_size,
            half: segment_size / 2,
            window: hann_window(segment_size),
            gains: gain_table(&spec, segment_size),
            fft_forward,
            fft_inverse,
            left: ChannelScratch::new(),
            right: ChannelScratch::new(),
        }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Output frames produced from a window: overlap-add consumes one
    /// segment of margin.
    pub fn output_len(window: &NoiseWindow) -> usize {
        (window.segment_count() - 1) * window.segment_size()
    }

    /// Filter one window into one block. The block must be sized for this
    /// window, i.e. one segment shorter.
    pub fn apply(&mut self, input: &NoiseWindow, out: &mut OutputBlock) {
        assert_eq!(input.segment_size(), self.size);
        assert_eq!(out.frames(), input.len() - self.size);

        let spec = self.spec;
        let size = self.size;
        let half = self.half;
        let window = &self.window;
        let gains = &self.gains;
        let fft_forward = &self.fft_forward;
        let fft_inverse = &self.fft_inverse;
        let left = &mut self.left;
        let right = &mut self.right;

        // The channels are independent; shape them in parallel and join
        // before the caller hands the block on.
        rayon::join(
            || {
                filter_channel(
                    &spec,
                    size,
                    half,
                    window,
                    gains,
                    fft_forward,
                    fft_inverse,
                    &input.left,
                    left,
                    &mut out.left,
                )
            },
            || {
                filter_channel(
                    &spec,
                    size,
                    half,
                    window,
                    gains,
                    fft_forward,
                    fft_inverse,
                    &input.right,
                    right,
                    &mut out.right,
                )
            },
        );
    }
}

/// Periodic Hann window: 0.5 - 0.5 * cos(2*pi*n/N). Sums to one with
/// 50% overlap, which keeps the `Sum` reconstruction unity-gain.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / size as f64).cos())
        .collect()
}

/// Scalar gain for every bin of a `size`-point spectrum. Bins are indexed by
/// distance from DC so conjugate pairs get identical gains.
fn gain_table(spec: &FilterSpec, size: usize) -> Vec<f64> {
    (0..size)
        .map(|j| {
            let bin = j.min(size - j);
            if bin <= spec.cutoff {
                return 0.0;
            }
            if spec.zero_nyquist && bin == size / 2 {
                return 0.0;
            }
            1.0 / (spec.alpha * bin as f64 + 1.0)
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn filter_channel(
    spec: &FilterSpec,
    size: usize,
    half: usize,
    window: &[f64],
    gains: &[f64],
    fft_forward: &Arc<dyn Fft<f64>>,
    fft_inverse: &Arc<dyn Fft<f64>>,
    input: &[f64],
    scratch: &mut ChannelScratch,
    out: &mut [f64],
) {
    let aligned_len = input.len();
    let shifted_len = input.len() - size;

    scratch.aligned.resize(aligned_len, Complex::new(0.0, 0.0));
    scratch.shifted.resize(shifted_len, Complex::new(0.0, 0.0));

    // Windowed copies of both views. Frame boundaries fall on multiples of
    // the segment size within each view, so the window index is i % size.
    for i in 0..aligned_len {
        scratch.aligned[i] = Complex::new(input[i] * window[i % size], 0.0);
    }
    for i in 0..shifted_len {
        scratch.shifted[i] = Complex::new(input[i + half] * window[i % size], 0.0);
    }

    // rustfft processes each segment-sized chunk as its own transform.
    fft_forward.process(&mut scratch.aligned);
    fft_forward.process(&mut scratch.shifted);

    for frame in scratch.aligned.chunks_exact_mut(size) {
        for (bin, gain) in frame.iter_mut().zip(gains) {
            *bin = *bin * *gain;
        }
    }
    for frame in scratch.shifted.chunks_exact_mut(size) {
        for (bin, gain) in frame.iter_mut().zip(gains) {
            *bin = *bin * *gain;
        }
    }

    fft_inverse.process(&mut scratch.aligned);
    fft_inverse.process(&mut scratch.shifted);

    // rustfft's inverse is unnormalized; fold the 1/size in here together
    // with the output gain and the overlap policy.
    let norm = match spec.overlap_norm {
        OverlapNorm::Sum => 1.0,
        OverlapNorm::Average => 0.5,
    };
    let scale = spec.gain * norm / size as f64;

    for (i, sample) in out.iter_mut().enumerate() {
        *sample = scale * (scratch.aligned[i + half].re + scratch.shifted[i].re);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{NoiseRange, NoiseSource};

    fn spec(alpha: f64, cutoff: usize, gain: f64, norm: OverlapNorm) -> FilterSpec {
        FilterSpec {
            alpha,
            cutoff,
            gain,
            overlap_norm: norm,
            zero_nyquist: true,
        }
    }

    /// A window holding a sinusoid at an integer bin, starting at a given
    /// global sample index. Integer-bin tones survive the windowed transform
    /// exactly, so these make the reconstruction maths checkable to
    /// round-off.
    fn sine_window(segments: usize, size: usize, bin: usize, start: usize) -> NoiseWindow {
        let mut window = NoiseWindow::new(segments, size);
        let omega = 2.0 * std::f64::consts::PI * bin as f64 / size as f64;
        for i in 0..window.len() {
            let n = (start + i) as f64;
            let value = (omega * n + 1.0).sin();
            window.left[i] = value;
            window.right[i] = value;
        }
        window
    }

    #[test]
    fn output_length_is_one_segment_less_than_the_window() {
        let mut filter = SpectralFilter::new(spec(0.1, 5, 1.0, OverlapNorm::Sum), 64);
        let mut window = NoiseWindow::new(4, 64);
        NoiseSource::new(NoiseRange::Symmetric, Some(3)).fill(&mut window);

        let mut out = OutputBlock::new(3, 64);
        filter.apply(&window, &mut out);
        assert_eq!(out.frames(), 3 * 64);
        assert_eq!(out.frames(), SpectralFilter::output_len(&window));
    }

    #[test]
    fn filtering_is_deterministic() {
        let mut filter = SpectralFilter::new(spec(0.1, 5, 2.0, OverlapNorm::Sum), 128);
        let mut window = NoiseWindow::new(3, 128);
        NoiseSource::new(NoiseRange::Symmetric, Some(11)).fill(&mut window);

        let mut first = OutputBlock::new(2, 128);
        let mut second = OutputBlock::new(2, 128);
        filter.apply(&window, &mut first);
        filter.apply(&window, &mut second);

        assert_eq!(first.left, second.left);
        assert_eq!(first.right, second.right);
    }

    #[test]
    fn dc_input_is_fully_suppressed() {
        // A Hann-windowed constant has spectral content at bins 0, 1, and
        // size-1 only, all of which fall under a cutoff of 1 or more.
        let mut filter = SpectralFilter::new(spec(0.1, 5, 1.0, OverlapNorm::Sum), 256);
        let mut window = NoiseWindow::new(4, 256);
        window.left.fill(0.5);
        window.right.fill(-0.25);

        let mut out = OutputBlock::new(3, 256);
        filter.apply(&window, &mut out);

        let peak = out
            .left
            .iter()
            .chain(out.right.iter())
            .fold(0.0f64, |acc, &v| acc.max(v.abs()));
        assert!(peak < 1e-9, "residual DC peak {peak}");
    }

    #[test]
    fn passthrough_reconstructs_a_tone_exactly() {
        let size = 256;
        let half = size / 2;
        let mut filter = SpectralFilter::new(spec(0.0, 0, 1.0, OverlapNorm::Sum), size);
        let window = sine_window(4, size, 8, 0);

        let mut out = OutputBlock::new(3, size);
        filter.apply(&window, &mut out);

        let omega = 2.0 * std::f64::consts::PI * 8.0 / size as f64;
        for (i, &sample) in out.left.iter().enumerate() {
            let expected = (omega * (i + half) as f64 + 1.0).sin();
            assert!(
                (sample - expected).abs() < 1e-9,
                "sample {i}: {sample} vs {expected}"
            );
        }
    }

    #[test]
    fn passthrough_preserves_energy_scaled_by_gain_squared() {
        let size = 256;
        let half = size / 2;
        let gain = 2.0;
        let mut filter = SpectralFilter::new(spec(0.0, 0, gain, OverlapNorm::Sum), size);
        let window = sine_window(4, size, 4, 0);

        let mut out = OutputBlock::new(3, size);
        filter.apply(&window, &mut out);

        let input_energy: f64 = window.left[half..window.len() - half]
            .iter()
            .map(|s| s * s)
            .sum();
        let output_energy: f64 = out.left.iter().map(|s| s * s).sum();

        let ratio = output_energy / input_energy;
        assert!(
            (ratio - gain * gain).abs() < 1e-9,
            "energy ratio {ratio} vs {}",
            gain * gain
        );
    }

    #[test]
    fn average_policy_halves_the_sum_reconstruction() {
        let size = 128;
        let window = sine_window(3, size, 4, 0);

        let mut summed = OutputBlock::new(2, size);
        let mut averaged = OutputBlock::new(2, size);
        SpectralFilter::new(spec(0.0, 0, 1.0, OverlapNorm::Sum), size).apply(&window, &mut summed);
        SpectralFilter::new(spec(0.0, 0, 1.0, OverlapNorm::Average), size)
            .apply(&window, &mut averaged);

        for (s, a) in summed.left.iter().zip(&averaged.left) {
            assert!((s * 0.5 - a).abs() < 1e-12);
        }
    }

    #[test]
    fn consecutive_blocks_are_continuous_at_the_seam() {
        // Two windows related by shift_and_fill semantics: the second starts
        // one output block later in the same global tone. Their blocks must
        // join without a jump, unlike an aligned-frames-only reconstruction
        // which dips to zero at every frame boundary.
        let size = 256;
        let half = size / 2;
        let segments = 4;
        let block_len = (segments - 1) * size;
        let mut filter = SpectralFilter::new(spec(0.0, 0, 1.0, OverlapNorm::Sum), size);

        let first = sine_window(segments, size, 8, 0);
        let second = sine_window(segments, size, 8, block_len);

        let mut block_a = OutputBlock::new(segments - 1, size);
        let mut block_b = OutputBlock::new(segments - 1, size);
        filter.apply(&first, &mut block_a);
        filter.apply(&second, &mut block_b);

        let omega = 2.0 * std::f64::consts::PI * 8.0 / size as f64;
        let reference =
            |global: usize| -> f64 { (omega * (global + half) as f64 + 1.0).sin() };

        let seam_gap = (block_b.left[0] - reference(block_len)).abs()
            + (block_a.left[block_len - 1] - reference(block_len - 1)).abs();
        assert!(seam_gap < 1e-9, "seam gap {seam_gap}");

        // Aligned view alone: windowed frames with no half-shifted partner.
        // The taper forces the signal toward zero at frame boundaries.
        let taper = hann_window(size);
        let mut broken_gap = 0.0f64;
        for (i, &expected) in first.left[half..first.len() - half].iter().enumerate() {
            let idx = i + half;
            let aligned_only = first.left[idx] * taper[idx % size];
            broken_gap = broken_gap.max((aligned_only - expected).abs());
        }
        assert!(
            broken_gap > 0.3,
            "non-overlapped reconstruction unexpectedly seamless ({broken_gap})"
        );
    }
}
