use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Range the raw noise samples are drawn from. Either works as filter
/// input; the spectral shaping removes DC regardless, so this mostly
/// affects headroom before the volume stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseRange {
    /// Uniform over [-1.0, 1.0).
    Symmetric,
    /// Uniform over [0.0, 1.0).
    Unit,
}

/// A sliding window over an infinite stereo noise stream.
///
/// The window is `segment_count * segment_size` samples per channel and is
/// refreshed in place: `NoiseSource::shift_and_fill` moves the final segment
/// to the front and redraws the rest, so consecutive windows overlap by
/// exactly one segment.
pub struct NoiseWindow {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
    segment_count: usize,
    segment_size: usize,
}

impl NoiseWindow {
    pub fn new(segment_count: usize, segment_size: usize) -> Self {
        Self {
            left: vec![0.0; segment_count * segment_size],
            right: vec![0.0; segment_count * segment_size],
            segment_count,
            segment_size,
        }
    }

    /// Samples per channel. Always a multiple of `segment_size`.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }
}

/// Uncorrelated sample source with an explicitly owned RNG.
///
/// Seeding is done once at construction; passing a fixed seed makes every
/// draw reproducible, which the tests rely on.
pub struct NoiseSource {
    rng: StdRng,
    dist: Uniform<f64>,
}

impl NoiseSource {
    pub fn new(range: NoiseRange, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dist = match range {
            NoiseRange::Symmetric => Uniform::new(-1.0, 1.0),
            NoiseRange::Unit => Uniform::new(0.0, 1.0),
        };
        Self { rng, dist }
    }

    /// Populate every sample of both channels with an independent draw.
    pub fn fill(&mut self, window: &mut NoiseWindow) {
        for i in 0..window.left.len() {
            window.left[i] = self.dist.sample(&mut self.rng);
            window.right[i] = self.dist.sample(&mut self.rng);
        }
    }

    /// Advance the stream: copy the final segment to the front, then redraw
    /// all remaining segments.
    pub fn shift_and_fill(&mut self, window: &mut NoiseWindow) {
        let segment = window.segment_size;
        let last = window.left.len() - segment;

        window.left.copy_within(last.., 0);
        window.right.copy_within(last.., 0);

        for i in segment..window.left.len() {
            window.left[i] = self.dist.sample(&mut self.rng);
            window.right[i] = self.dist.sample(&mut self.rng);
        }
    }
}
