use anyhow::{anyhow, ensure, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use crossbeam::channel::{after, bounded, Receiver, Sender};
use crossbeam::select;

use crate::block::OutputBlock;
use crate::config::Config;
use crate::pipeline::BlockPipeline;

/// The real-time callback boundary.
///
/// `fill` is copy-only: it dequeues ready blocks and interleaves them into
/// the driver's buffer, blocking on the queue when production falls behind.
/// All filtering work happens upstream on the producer thread. A cursor into
/// the current block makes the copy robust to callback sizes that differ
/// from the configured block length.
pub struct AudioSink {
    blocks: Receiver<OutputBlock>,
    recycle: Option<Sender<OutputBlock>>,
    current: Option<OutputBlock>,
    position: usize,
}

impl AudioSink {
    pub fn new(pipeline: BlockPipeline) -> Self {
        let (blocks, recycle) = pipeline.into_parts();
        Self {
            blocks,
            recycle,
            current: None,
            position: 0,
        }
    }

    /// Fill an interleaved stereo f32 buffer from the block queue.
    pub fn fill(&mut self, out: &mut [f32]) {
        let mut offset = 0;
        while offset < out.len() {
            if out.len() - offset < 2 {
                // Stereo frames come in pairs; zero any ragged tail.
                out[offset..].fill(0.0);
                return;
            }
            let exhausted = match &self.current {
                Some(block) => {
                    let frames = block.write_interleaved(self.position, &mut out[offset..]);
                    self.position += frames;
                    offset += frames * 2;
                    self.position >= block.frames()
                }
                None => {
                    match self.blocks.recv() {
                        Ok(block) => {
                            self.current = Some(block);
                            self.position = 0;
                        }
                        Err(_) => {
                            // Producer is gone; emit silence rather than
                            // stale data.
                            out[offset..].fill(0.0);
                            return;
                        }
                    }
                    false
                }
            };

            if exhausted {
                if let Some(block) = self.current.take() {
                    if let Some(returns) = &self.recycle {
                        // The return channel has one slot per pool block, so
                        // this never actually fails while the producer lives.
                        let _ = returns.try_send(block);
                    }
                }
            }
        }
    }
}

/// Open the default stereo output stream, feed it from the sink, and keep it
/// running for the configured play time (or until Ctrl-C). Any device-level
/// failure is fatal; there is no degraded mode for a generator that cannot
/// reach its output.
pub fn play(config: &Config, mut sink: AudioSink) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;
    log::info!(
        "using audio device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let supported = device
        .default_output_config()
        .map_err(|e| anyhow!("failed to query default output config: {e}"))?;
    ensure!(
        supported.sample_format() == SampleFormat::F32,
        "unsupported device sample format {:?}",
        supported.sample_format()
    );

    let frames = config.frames_per_block();
    let stream_config = StreamConfig {
        channels: 2,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Fixed(frames as u32),
    };
    log::info!(
        "output stream: 2 channels, {} Hz, {} frames per callback",
        config.sample_rate,
        frames
    );

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                sink.fill(data);
            },
            |err| log::error!("stream error: {err}"),
            None,
        )
        .map_err(|e| anyhow!("failed to build output stream: {e}"))?;
    stream
        .play()
        .map_err(|e| anyhow!("failed to start output stream: {e}"))?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| anyhow!("failed to install interrupt handler: {e}"))?;

    select! {
        recv(stop_rx) -> _ => log::info!("interrupted, stopping"),
        recv(after(config.play_duration())) -> _ => log::info!("play time elapsed"),
    }

    stream
        .pause()
        .map_err(|e| anyhow!("failed to stop output stream: {e}"))?;
    Ok(())
}
