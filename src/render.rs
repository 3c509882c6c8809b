use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio_io::AudioSink;
use crate::block::OutputBlock;
use crate::config::Config;
use crate::filter::SpectralFilter;
use crate::noise::{NoiseSource, NoiseWindow};
use crate::pipeline::BlockPipeline;

/// Filter a single block offline and write it as tab-separated text for
/// plotting. Bypasses the audio device entirely.
pub fn dump_block(config: &Config, path: &Path) -> Result<()> {
    let mut source = NoiseSource::new(config.noise_range, config.seed);
    let mut window = NoiseWindow::new(config.window_segments(), config.segment_size);
    let mut filter = SpectralFilter::new(config.filter_spec(), config.segment_size);

    source.fill(&mut window);
    source.shift_and_fill(&mut window);

    let mut block = OutputBlock::new(config.segment_count, config.segment_size);
    filter.apply(&window, &mut block);
    block.scale(config.volume);
    block.dump(path)?;

    log::info!("dumped {} frames to {}", block.frames(), path.display());
    Ok(())
}

/// Render the configured play time through the normal pipeline into a
/// 16-bit stereo WAV file instead of the audio device.
pub fn render_wav(config: &Config, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| anyhow::anyhow!("failed to create WAV file: {e}"))?;

    let mut sink = AudioSink::new(BlockPipeline::start(config));
    let target_frames = config.sample_rate as usize * config.time as usize;
    log::info!(
        "rendering {} frames at {} Hz to {}",
        target_frames,
        config.sample_rate,
        path.display()
    );
    let start = Instant::now();

    let mut buffer = vec![0.0f32; config.frames_per_block() * 2];
    let mut remaining = target_frames;
    while remaining > 0 {
        let frames = (buffer.len() / 2).min(remaining);
        sink.fill(&mut buffer[..frames * 2]);
        for sample in &buffer[..frames * 2] {
            let narrowed = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(narrowed)
                .map_err(|e| anyhow::anyhow!("failed to write sample: {e}"))?;
        }
        remaining -= frames;
    }

    writer
        .finalize()
        .map_err(|e| anyhow::anyhow!("failed to finalize WAV file: {e}"))?;
    log::info!("rendered in {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}
