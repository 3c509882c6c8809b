use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::block::OutputBlock;
use crate::config::Config;
use crate::filter::SpectralFilter;
use crate::noise::{NoiseSource, NoiseWindow};

/// Bounded handoff of ready blocks between the producer thread and the audio
/// callback.
///
/// The queue is the only synchronization point in the pipeline: `send`
/// blocks the producer when the consumer is `buffer_count` blocks behind
/// (backpressure paces production to real time), and `recv` blocks the
/// consumer when production falls behind (which surfaces as an underrun, not
/// an error). Blocks arrive in the exact order produced.
///
/// In recycle mode a return channel carries consumed blocks back to the
/// producer, so exactly `buffer_count` blocks exist for the lifetime of the
/// process and the pool replays in round-robin order forever.
pub struct BlockPipeline {
    blocks: Receiver<OutputBlock>,
    recycle: Option<Sender<OutputBlock>>,
    allocated: Arc<AtomicUsize>,
}

impl BlockPipeline {
    /// Start exactly one background producer for the configured policy. The
    /// thread is detached; it exits on its own once every receiver is gone
    /// and is otherwise abandoned at process exit.
    pub fn start(config: &Config) -> Self {
        let (block_tx, block_rx) = bounded(config.buffer_count);
        let allocated = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&allocated);
        let config = config.clone();

        if config.recycle {
            let (return_tx, return_rx) = bounded(config.buffer_count);
            thread::spawn(move || recycling_producer(config, block_tx, return_rx, counter));
            Self {
                blocks: block_rx,
                recycle: Some(return_tx),
                allocated,
            }
        } else {
            thread::spawn(move || streaming_producer(config, block_tx, counter));
            Self {
                blocks: block_rx,
                recycle: None,
                allocated,
            }
        }
    }

    pub fn receiver(&self) -> &Receiver<OutputBlock> {
        &self.blocks
    }

    /// Return channel for consumed blocks; present only in recycle mode.
    pub fn recycle_sender(&self) -> Option<&Sender<OutputBlock>> {
        self.recycle.as_ref()
    }

    /// Distinct blocks allocated by this pipeline's producer so far.
    pub fn blocks_allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub(crate) fn into_parts(self) -> (Receiver<OutputBlock>, Option<Sender<OutputBlock>>) {
        (self.blocks, self.recycle)
    }
}

struct Producer {
    source: NoiseSource,
    window: NoiseWindow,
    filter: SpectralFilter,
    volume: f64,
    segment_count: usize,
    segment_size: usize,
    allocated: Arc<AtomicUsize>,
}

impl Producer {
    fn new(config: &Config, allocated: Arc<AtomicUsize>) -> Self {
        let mut source = NoiseSource::new(config.noise_range, config.seed);
        let mut window = NoiseWindow::new(config.window_segments(), config.segment_size);
        source.fill(&mut window);

        Self {
            source,
            window,
            filter: SpectralFilter::new(config.filter_spec(), config.segment_size),
            volume: config.volume,
            segment_count: config.segment_count,
            segment_size: config.segment_size,
            allocated,
        }
    }

    /// Advance the window one block and filter it into a fresh allocation.
    fn next_block(&mut self) -> OutputBlock {
        self.source.shift_and_fill(&mut self.window);
        let mut block = OutputBlock::new(self.segment_count, self.segment_size);
        self.allocated.fetch_add(1, Ordering::Relaxed);
        self.filter.apply(&self.window, &mut block);
        block.scale(self.volume);
        block
    }
}

/// Streaming policy: fresh blocks forever, CPU cost proportional to play
/// time. A failed send means every consumer is gone, so the loop ends.
fn streaming_producer(config: Config, tx: Sender<OutputBlock>, allocated: Arc<AtomicUsize>) {
    let mut producer = Producer::new(&config, allocated);
    log::debug!(
        "streaming producer started: {} frames/block, queue depth {}",
        config.frames_per_block(),
        config.buffer_count
    );

    loop {
        let block = producer.next_block();
        if tx.send(block).is_err() {
            log::debug!("block queue closed, streaming producer exiting");
            return;
        }
    }
}

/// Recycling policy: precompute `buffer_count` distinct blocks from an
/// evolving window, then replay them in arrival order forever. Total filter
/// work is bounded regardless of play time.
fn recycling_producer(
    config: Config,
    tx: Sender<OutputBlock>,
    returns: Receiver<OutputBlock>,
    allocated: Arc<AtomicUsize>,
) {
    let mut producer = Producer::new(&config, allocated);
    log::debug!(
        "recycling producer started: pool of {} blocks",
        config.buffer_count
    );

    for _ in 0..config.buffer_count {
        let block = producer.next_block();
        if tx.send(block).is_err() {
            return;
        }
    }

    // The consumer returns each block after copying it out; forwarding in
    // receive order keeps the pool cycling round-robin.
    while let Ok(block) = returns.recv() {
        if tx.send(block).is_err() {
            return;
        }
    }
    log::debug!("return channel closed, recycling producer exiting");
}
