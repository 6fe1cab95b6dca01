//! Splits 10 ms frames into [`BLOCK_SIZE`] blocks, carrying the remainder.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::{BLOCK_SIZE, Block};

#[derive(Debug)]
pub(crate) struct FrameBlocker {
    pending: Vec<Vec<f32>>,
}

impl FrameBlocker {
    pub(crate) fn new(num_channels: usize) -> Self {
        Self {
            pending: vec![Vec::with_capacity(BLOCK_SIZE * 9); num_channels],
        }
    }

    pub(crate) fn insert_frame(&mut self, frame: &ChannelBuffer<f32>) {
        debug_assert_eq!(frame.num_channels(), self.pending.len());
        for (pending, channel) in self.pending.iter_mut().zip(frame.channels()) {
            pending.extend_from_slice(channel);
        }
    }

    /// Samples waiting per channel.
    pub(crate) fn buffered(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    /// Moves the next full block of every channel into `blocks`.
    pub(crate) fn extract_block(&mut self, blocks: &mut [Block]) -> bool {
        if self.buffered() < BLOCK_SIZE {
            return false;
        }
        for (block, pending) in blocks.iter_mut().zip(self.pending.iter_mut()) {
            block.copy_from_slice(&pending[..BLOCK_SIZE]);
            pending.drain(..BLOCK_SIZE);
        }
        true
    }
}
