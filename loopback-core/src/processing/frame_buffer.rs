/// Fixed-capacity block of 16-bit samples moved from capture to playback.
///
/// Allocated once per session; the hot path only rewrites its contents.
/// `filled` tracks how many leading samples hold the current frame (a capture
/// read may return less than a full buffer).
#[derive(Debug)]
pub struct FrameBuffer {
    samples: Box<[i16]>,
    filled: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity].into_boxed_slice(),
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of valid samples in the current frame.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The whole backing storage, for a capture read to fill.
    pub fn storage_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Mark the first `count` samples as the current frame (clamped to capacity).
    pub fn set_filled(&mut self, count: usize) {
        self.filled = count.min(self.samples.len());
    }

    /// The current frame.
    pub fn frame(&self) -> &[i16] {
        &self.samples[..self.filled]
    }

    /// The current frame, for in-place processing.
    pub fn frame_mut(&mut self) -> &mut [i16] {
        &mut self.samples[..self.filled]
    }

    /// Forget the current frame. Storage is kept.
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}
