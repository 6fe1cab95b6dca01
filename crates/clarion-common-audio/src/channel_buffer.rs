//! Planar multi-channel sample storage.

/// Contiguous storage for `num_channels` planar channels of `num_frames`
/// samples each.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer<T> {
    data: Vec<T>,
    num_frames: usize,
    num_channels: usize,
}

impl<T: Copy + Default> ChannelBuffer<T> {
    pub fn new(num_frames: usize, num_channels: usize) -> Self {
        Self {
            data: vec![T::default(); num_frames * num_channels],
            num_frames,
            num_channels,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn channel(&self, index: usize) -> &[T] {
        let start = index * self.num_frames;
        &self.data[start..start + self.num_frames]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        let start = index * self.num_frames;
        &mut self.data[start..start + self.num_frames]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.num_frames.max(1)).take(self.num_channels)
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        let num_channels = self.num_channels;
        self.data
            .chunks_exact_mut(self.num_frames.max(1))
            .take(num_channels)
    }

    /// Borrows all channels as a slice-of-slices.
    pub fn as_slices(&self) -> Vec<&[T]> {
        self.channels().collect()
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_disjoint() {
        let mut buffer = ChannelBuffer::<f32>::new(4, 3);
        for (i, channel) in buffer.channels_mut().enumerate() {
            channel.fill(i as f32);
        }
        assert_eq!(buffer.channel(0), &[0.0; 4]);
        assert_eq!(buffer.channel(2), &[2.0; 4]);
        assert_eq!(buffer.channels().count(), 3);
    }

    #[test]
    fn empty_frames_yield_no_channels_data() {
        let buffer = ChannelBuffer::<i16>::new(0, 2);
        assert!(buffer.channel(1).is_empty());
    }
}
