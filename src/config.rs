use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::filter::{FilterSpec, OverlapNorm};
use crate::noise::NoiseRange;

/// Command-line surface. Every option can also come from a TOML file via
/// `--config`; flags given on the command line win.
#[derive(Parser, Debug)]
#[command(name = "gnoise", version, about = "Streaming colored-noise generator")]
pub struct Cli {
    /// TOML config file providing defaults for any of the other options.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Samples per second.
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Length of play in seconds.
    #[arg(long)]
    pub time: Option<u64>,

    /// Number of blocks to calculate ahead of time (queue depth).
    #[arg(long)]
    pub buffer_count: Option<usize>,

    /// Segment size in samples; also the transform frame size. Must be even.
    #[arg(long)]
    pub segment_size: Option<usize>,

    /// Output segments per block. The noise window holds one more segment
    /// than this for overlap-add margin.
    #[arg(long)]
    pub segment_count: Option<usize>,

    /// 0.0 is white noise, 0.1 is pink-ish noise.
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Discard spectrum bins up to and including this index.
    #[arg(long)]
    pub cutoff: Option<usize>,

    /// Post-filter gain; use this to adjust for low alpha values.
    #[arg(long)]
    pub gain: Option<f64>,

    /// Master output volume.
    #[arg(long)]
    pub volume: Option<f64>,

    /// Precompute a fixed pool of blocks and replay it cyclically instead of
    /// streaming fresh ones. Bounds total CPU work at the cost of audible
    /// looping.
    #[arg(long)]
    pub recycle: bool,

    /// Only log errors.
    #[arg(long)]
    pub quiet: bool,

    /// Fixed RNG seed for reproducible noise.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Range raw noise samples are drawn from.
    #[arg(long, value_enum)]
    pub noise_range: Option<NoiseRange>,

    /// Whether overlapping reconstructions are summed or averaged.
    #[arg(long, value_enum)]
    pub overlap_norm: Option<OverlapNorm>,

    /// Write one filtered block as tab-separated text and exit.
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Render the configured play time to a WAV file and exit.
    #[arg(long)]
    pub render: Option<PathBuf>,
}

/// Resolved configuration, validated eagerly before any task starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sample_rate: u32,
    pub time: u64,
    pub buffer_count: usize,
    pub segment_size: usize,
    pub segment_count: usize,
    pub alpha: f64,
    pub cutoff: usize,
    pub gain: f64,
    pub volume: f64,
    pub recycle: bool,
    pub quiet: bool,
    pub seed: Option<u64>,
    pub noise_range: NoiseRange,
    pub overlap_norm: OverlapNorm,
    pub zero_nyquist: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            time: 3600,
            buffer_count: 3,
            segment_size: 16_384,
            segment_count: 10,
            alpha: 0.1,
            cutoff: 5,
            gain: 10.0,
            volume: 1.0,
            recycle: false,
            quiet: false,
            seed: None,
            noise_range: NoiseRange::Symmetric,
            overlap_norm: OverlapNorm::Sum,
            zero_nyquist: true,
        }
    }
}

impl Config {
    /// Layer the config file (if any) over the defaults, then the
    /// command-line flags over that.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(v) = cli.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = cli.time {
            config.time = v;
        }
        if let Some(v) = cli.buffer_count {
            config.buffer_count = v;
        }
        if let Some(v) = cli.segment_size {
            config.segment_size = v;
        }
        if let Some(v) = cli.segment_count {
            config.segment_count = v;
        }
        if let Some(v) = cli.alpha {
            config.alpha = v;
        }
        if let Some(v) = cli.cutoff {
            config.cutoff = v;
        }
        if let Some(v) = cli.gain {
            config.gain = v;
        }
        if let Some(v) = cli.volume {
            config.volume = v;
        }
        if let Some(v) = cli.seed {
            config.seed = Some(v);
        }
        if let Some(v) = cli.noise_range {
            config.noise_range = v;
        }
        if let Some(v) = cli.overlap_norm {
            config.overlap_norm = v;
        }
        config.recycle |= cli.recycle;
        config.quiet |= cli.quiet;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.sample_rate > 0, "sample rate must be positive");
        ensure!(self.time >= 1, "play time must be at least one second");
        ensure!(self.buffer_count >= 1, "buffer count must be at least 1");
        ensure!(
            self.segment_size >= 8 && self.segment_size % 2 == 0,
            "segment size must be even and at least 8, got {}",
            self.segment_size
        );
        ensure!(self.segment_count >= 1, "segment count must be at least 1");
        ensure!(
            self.cutoff < self.segment_size / 2,
            "cutoff bin {} must be below the Nyquist bin {}",
            self.cutoff,
            self.segment_size / 2
        );
        ensure!(
            self.alpha.is_finite() && self.alpha >= 0.0,
            "alpha must be finite and non-negative"
        );
        ensure!(
            self.gain.is_finite() && self.gain >= 0.0,
            "gain must be finite and non-negative"
        );
        ensure!(
            self.volume.is_finite() && self.volume >= 0.0,
            "volume must be finite and non-negative"
        );
        Ok(())
    }

    /// Stereo frames the audio driver consumes per callback, and the length
    /// of every output block.
    pub fn frames_per_block(&self) -> usize {
        self.segment_size * self.segment_count
    }

    /// Segments in the producer's noise window: one more than the block for
    /// overlap-add margin.
    pub fn window_segments(&self) -> usize {
        self.segment_count + 1
    }

    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec {
            alpha: self.alpha,
            cutoff: self.cutoff,
            gain: self.gain,
            overlap_norm: self.overlap_norm,
            zero_nyquist: self.zero_nyquist,
        }
    }

    pub fn play_duration(&self) -> Duration {
        Duration::from_secs(self.time)
    }
}
