pub mod audio_io;
pub mod block;
pub mod config;
pub mod filter;
pub mod logging;
pub mod noise;
pub mod pipeline;
pub mod render;

pub use block::OutputBlock;
pub use config::Config;
pub use filter::{FilterSpec, OverlapNorm, SpectralFilter};
pub use noise::{NoiseRange, NoiseSource, NoiseWindow};
pub use pipeline::BlockPipeline;
