//! Re-chunks arbitrary-length input into fixed-size frames.

/// Buffers samples until a full frame is available.
#[derive(Debug, Clone)]
pub struct FrameAccumulator<T> {
    frame_len: usize,
    pending: Vec<T>,
}

impl<T: Copy> FrameAccumulator<T> {
    /// `frame_len` counts interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `frame_len` is zero.
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        }
    }

    /// 10 ms frames of interleaved audio.
    pub fn for_stream(sample_rate_hz: u32, num_channels: usize) -> Self {
        Self::new((sample_rate_hz as usize / 100).max(1) * num_channels.max(1))
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Appends `input` and calls `on_frame` once per completed frame.
    /// Returns the number of frames emitted.
    pub fn push(&mut self, mut input: &[T], mut on_frame: impl FnMut(&[T])) -> usize {
        let mut emitted = 0;
        if !self.pending.is_empty() {
            let take = (self.frame_len - self.pending.len()).min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.pending.len() < self.frame_len {
                return 0;
            }
            on_frame(&self.pending);
            self.pending.clear();
            emitted += 1;
        }
        let mut frames = input.chunks_exact(self.frame_len);
        for frame in &mut frames {
            on_frame(frame);
            emitted += 1;
        }
        self.pending.extend_from_slice(frames.remainder());
        emitted
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
