//! History of render blocks with their transforms.
//!
//! Blocks are addressed by an absolute index counted from the first
//! inserted block. Capture block `c` is aligned with render block
//! `c + offset`. The offset starts at zero and is moved only when the
//! render stream runs dry or gets too far ahead.

use crate::aec_fft::AecFft;
use crate::common::{BLOCK_SIZE, Block, FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::fft_data::FftData;

#[derive(Debug)]
struct RenderEntry {
    block: Block,
    /// Transform of the previous and this block.
    fft: FftData,
    spectrum: Spectrum,
}

impl Default for RenderEntry {
    fn default() -> Self {
        Self {
            block: [0.0; BLOCK_SIZE],
            fft: FftData::default(),
            spectrum: [0.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }
}

#[derive(Debug)]
pub(crate) struct RenderBuffer {
    entries: Vec<RenderEntry>,
    silent: RenderEntry,
    /// Blocks inserted so far.
    written: u64,
    offset: i64,
    /// Most recent blocks that must stay readable behind the aligned index.
    history: usize,
}

impl RenderBuffer {
    /// `history` is the number of blocks the readers look back from the
    /// aligned index. `lookahead` is how far render may run ahead.
    pub(crate) fn new(history: usize, lookahead: usize) -> Self {
        Self {
            entries: (0..history + lookahead + 1).map(|_| RenderEntry::default()).collect(),
            silent: RenderEntry::default(),
            written: 0,
            offset: 0,
            history,
        }
    }

    pub(crate) fn insert(&mut self, block: &Block, fft: &mut AecFft) {
        let len = self.entries.len() as u64;
        let previous = if self.written == 0 {
            [0.0; BLOCK_SIZE]
        } else {
            self.entries[((self.written - 1) % len) as usize].block
        };
        let entry = &mut self.entries[(self.written % len) as usize];
        entry.block = *block;
        fft.padded_fft(block, &previous, false, &mut entry.fft);
        entry.fft.spectrum(&mut entry.spectrum);
        self.written += 1;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Render index aligned with capture block `capture_index`.
    pub(crate) fn align(&mut self, capture_index: u64) -> Option<u64> {
        if self.written == 0 {
            return None;
        }
        let latest = self.written as i64 - 1;
        let mut aligned = capture_index as i64 + self.offset;
        if aligned > latest {
            tracing::warn!(
                missing = aligned - latest,
                "render stream behind capture, realigning"
            );
            self.offset = latest - capture_index as i64;
            aligned = latest;
        }
        let lookahead = (self.entries.len() - self.history - 1) as i64;
        if latest - aligned > lookahead {
            tracing::warn!(
                excess = latest - aligned - lookahead,
                "render stream too far ahead, dropping history"
            );
            self.offset = latest - lookahead - capture_index as i64;
            aligned = latest - lookahead;
        }
        Some(aligned as u64)
    }

    fn entry(&self, aligned: u64, blocks_back: usize) -> &RenderEntry {
        let len = self.entries.len() as u64;
        let Some(index) = aligned.checked_sub(blocks_back as u64) else {
            return &self.silent;
        };
        if index >= self.written || self.written - index > len {
            return &self.silent;
        }
        &self.entries[(index % len) as usize]
    }

    pub(crate) fn block(&self, aligned: u64, blocks_back: usize) -> &Block {
        &self.entry(aligned, blocks_back).block
    }

    pub(crate) fn fft(&self, aligned: u64, blocks_back: usize) -> &FftData {
        &self.entry(aligned, blocks_back).fft
    }

    pub(crate) fn spectrum(&self, aligned: u64, blocks_back: usize) -> &Spectrum {
        &self.entry(aligned, blocks_back).spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: f32) -> Block {
        [value; BLOCK_SIZE]
    }

    #[test]
    fn reads_back_inserted_blocks() {
        let mut fft = AecFft::new();
        let mut buffer = RenderBuffer::new(8, 4);
        for i in 0..5 {
            buffer.insert(&block(i as f32), &mut fft);
        }
        let aligned = buffer.align(4).unwrap_or_default();
        assert_eq!(aligned, 4);
        assert_eq!(buffer.block(aligned, 0)[0], 4.0);
        assert_eq!(buffer.block(aligned, 3)[0], 1.0);
        assert_eq!(buffer.block(aligned, 7)[0], 0.0);
        // The 3 -> 4 step between the transformed blocks leaks into odd bins.
        assert!((buffer.fft(aligned, 0).re[0] - 64.0 * 7.0).abs() < 1e-2);
        assert!(buffer.spectrum(aligned, 0)[1] > 1.0);
    }

    #[test]
    fn repeated_constant_block_transforms_to_dc() {
        let mut fft = AecFft::new();
        let mut buffer = RenderBuffer::new(4, 2);
        buffer.insert(&block(2.0), &mut fft);
        buffer.insert(&block(2.0), &mut fft);
        let aligned = buffer.align(1).unwrap_or_default();
        assert_eq!(aligned, 1);
        assert!((buffer.fft(aligned, 0).re[0] - 128.0 * 2.0).abs() < 1e-2);
        let spectrum = buffer.spectrum(aligned, 0);
        assert!(spectrum[1..].iter().all(|&p| p < 1e-3), "{spectrum:?}");
    }

    #[test]
    fn realigns_when_render_is_missing() {
        let mut fft = AecFft::new();
        let mut buffer = RenderBuffer::new(4, 4);
        assert_eq!(buffer.align(0), None);
        buffer.insert(&block(1.0), &mut fft);
        assert_eq!(buffer.align(3), Some(0));
        buffer.insert(&block(2.0), &mut fft);
        assert_eq!(buffer.align(4), Some(1));
    }

    #[test]
    fn realigns_when_render_runs_ahead() {
        let mut fft = AecFft::new();
        let mut buffer = RenderBuffer::new(4, 2);
        for i in 0..10 {
            buffer.insert(&block(i as f32), &mut fft);
        }
        let aligned = buffer.align(0).unwrap_or_default();
        assert_eq!(aligned, 7);
        assert_eq!(buffer.block(aligned, 4)[0], 3.0);
        assert_eq!(buffer.align(1), Some(8));
    }
}
