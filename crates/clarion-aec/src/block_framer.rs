//! Reassembles processed blocks into 10 ms frames.
//!
//! Starts with one block of silence so that a frame can always be
//! produced once the blocks of its input frame have been inserted.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::{BLOCK_SIZE, Block};

#[derive(Debug)]
pub(crate) struct BlockFramer {
    pending: Vec<Vec<f32>>,
}

impl BlockFramer {
    pub(crate) fn new(num_channels: usize) -> Self {
        Self {
            pending: vec![vec![0.0; BLOCK_SIZE]; num_channels],
        }
    }

    pub(crate) fn insert_block(&mut self, blocks: &[Block]) {
        for (pending, block) in self.pending.iter_mut().zip(blocks) {
            pending.extend_from_slice(block);
        }
    }

    /// Fills `frame` from the front of the queue. Missing samples are zero.
    pub(crate) fn extract_frame(&mut self, frame: &mut ChannelBuffer<f32>) {
        let len = frame.num_frames();
        for (pending, out) in self.pending.iter_mut().zip(frame.channels_mut()) {
            let available = pending.len().min(len);
            debug_assert_eq!(available, len, "block framer underrun");
            out[..available].copy_from_slice(&pending[..available]);
            out[available..].fill(0.0);
            pending.drain(..available);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_blocker::FrameBlocker;

    #[test]
    fn round_trip_delays_by_one_block() {
        let mut blocker = FrameBlocker::new(1);
        let mut framer = BlockFramer::new(1);
        let mut blocks = vec![[0.0; BLOCK_SIZE]; 1];
        let mut output = Vec::new();
        for frame_index in 0..10 {
            let mut frame = ChannelBuffer::new(480, 1);
            for (i, x) in frame.channel_mut(0).iter_mut().enumerate() {
                *x = (frame_index * 480 + i) as f32 + 1.0;
            }
            blocker.insert_frame(&frame);
            while blocker.extract_block(&mut blocks) {
                framer.insert_block(&blocks);
            }
            framer.extract_frame(&mut frame);
            output.extend_from_slice(frame.channel(0));
        }
        assert!(output[..BLOCK_SIZE].iter().all(|&x| x == 0.0));
        for (i, &x) in output[BLOCK_SIZE..].iter().enumerate() {
            assert_eq!(x, i as f32 + 1.0);
        }
    }
}
