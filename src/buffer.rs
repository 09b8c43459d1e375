use std::collections::VecDeque;

/// Accumulates arbitrary-length chunks of PCM samples and hands them out
/// in frames of a fixed size.
#[derive(Debug)]
pub struct FrameBuffer {
    samples: VecDeque<i16>,
    frame_size: usize,
}

impl FrameBuffer {
    /// Create an empty buffer producing frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(2 * frame_size),
            frame_size,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of buffered samples not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append new samples from any iterator.
    pub fn push<I>(&mut self, new_samples: I)
    where
        I: IntoIterator<Item = i16>,
    {
        self.samples.extend(new_samples);
    }

    /// Take the oldest full frame, or `None` if fewer than `frame_size` samples are buffered.
    pub fn pop_frame(&mut self) -> Option<Vec<i16>> {
        if self.samples.len() >= self.frame_size {
            Some(self.samples.drain(..self.frame_size).collect())
        } else {
            None
        }
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
