use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// One filtered, ready-to-play stereo block.
///
/// Ownership moves through the pipeline: producer → queue → audio sink, so a
/// block is never visible to two threads at once.
pub struct OutputBlock {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
    segment_size: usize,
}

impl OutputBlock {
    pub fn new(segment_count: usize, segment_size: usize) -> Self {
        Self {
            left: vec![0.0; segment_count * segment_size],
            right: vec![0.0; segment_count * segment_size],
            segment_size,
        }
    }

    /// Stereo frames held by this block.
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Master volume scaling, applied by the producer after filtering.
    pub fn scale(&mut self, factor: f64) {
        for sample in &mut self.left {
            *sample *= factor;
        }
        for sample in &mut self.right {
            *sample *= factor;
        }
    }

    /// Copy frames starting at `from` into an interleaved L/R buffer,
    /// narrowing to the audio driver's f32 precision. Returns the number of
    /// frames copied, limited by whichever side runs out first.
    pub fn write_interleaved(&self, from: usize, out: &mut [f32]) -> usize {
        let frames = (out.len() / 2).min(self.frames().saturating_sub(from));
        for i in 0..frames {
            out[i * 2] = self.left[from + i] as f32;
            out[i * 2 + 1] = self.right[from + i] as f32;
        }
        frames
    }

    /// Diagnostic dump for offline plotting: one `index<TAB>amplitude` line
    /// per sample, left channel first, then a blank gap, then right.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create dump file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        for (i, sample) in self.left.iter().enumerate() {
            writeln!(writer, "{i}\t{sample:.6}")?;
        }
        writeln!(writer)?;
        writeln!(writer)?;
        for (i, sample) in self.right.iter().enumerate() {
            writeln!(writer, "{i}\t{sample:.6}")?;
        }

        writer.flush().context("failed to flush dump file")?;
        Ok(())
    }
}
