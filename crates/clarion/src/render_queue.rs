//! Bounded hand-off of render frames to the capture path.

use clarion_common_audio::channel_buffer::ChannelBuffer;

/// Render frames buffered between two capture frames.
pub(crate) const MAX_NUM_FRAMES_TO_BUFFER: usize = 100;

/// Fixed-capacity ring of preallocated frames.
///
/// Pushing into a full queue overwrites the oldest frame, so a render
/// stream that runs ahead of the capture stream costs echo reference, never
/// unbounded memory or latency.
#[derive(derive_more::Debug)]
pub(crate) struct RenderQueue {
    #[debug(skip)]
    slots: Vec<ChannelBuffer<f32>>,
    head: usize,
    len: usize,
    dropped: u64,
}

impl RenderQueue {
    pub(crate) fn new(capacity: usize, num_frames: usize, num_channels: usize) -> Self {
        Self {
            slots: (0..capacity.max(1))
                .map(|_| ChannelBuffer::new(num_frames, num_channels))
                .collect(),
            head: 0,
            len: 0,
            dropped: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frames lost to overflow since creation.
    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Copies `frame` into the queue. Returns `false` if the oldest frame
    /// had to be dropped to make room.
    pub(crate) fn push(&mut self, frame: &ChannelBuffer<f32>) -> bool {
        let capacity = self.slots.len();
        let kept = self.len < capacity;
        if kept {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % capacity;
            self.dropped += 1;
            tracing::warn!(dropped = self.dropped, "render queue full, dropping oldest frame");
        }
        let tail = (self.head + self.len - 1) % capacity;
        for (slot, src) in self.slots[tail].channels_mut().zip(frame.channels()) {
            slot.copy_from_slice(src);
        }
        kept
    }

    /// Hands every queued frame to `f`, oldest first, and empties the queue.
    pub(crate) fn drain(&mut self, mut f: impl FnMut(&ChannelBuffer<f32>)) {
        let capacity = self.slots.len();
        while self.len > 0 {
            f(&self.slots[self.head]);
            self.head = (self.head + 1) % capacity;
            self.len -= 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
