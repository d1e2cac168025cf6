//! Payload carried by the relay: one block of audio samples.

use std::time::Instant;

use arrayvec::ArrayVec;

/// Largest block the relay can carry. Sizes the inline sample array.
pub const MAX_BLOCK: usize = 1024;

/// One producer cycle's worth of samples plus metadata.
///
/// Fixed capacity, so refilling a block in place never allocates.
#[derive(Debug, Clone, Default)]
pub struct SampleBlock {
    /// `None` until the producer fills the block for the first time.
    pub frame_id: Option<u64>,
    pub samples: ArrayVec<f32, MAX_BLOCK>,
    /// When the producer finished filling the block.
    pub produced_at: Option<Instant>,
}

impl SampleBlock {
    /// Deterministic sample value for a frame, so any reader can re-derive it.
    #[inline]
    #[must_use]
    pub fn level(frame_id: u64) -> f32 {
        #[allow(clippy::cast_precision_loss)] // frame_id % 100 is exact in f32.
        let step = (frame_id % 100) as f32;
        step * 0.01
    }

    /// A block of `len` zero samples that no producer has filled yet. This is
    /// what the consumer observes before the first commit.
    #[must_use]
    pub fn silence(len: usize) -> Self {
        Self {
            frame_id: None,
            samples: std::iter::repeat_n(0.0, len.min(MAX_BLOCK)).collect(),
            produced_at: None,
        }
    }

    /// Overwrite the block in place with `len` samples of frame `frame_id`.
    ///
    /// `len` is clamped to [`MAX_BLOCK`].
    pub fn fill(&mut self, frame_id: u64, len: usize) {
        let level = Self::level(frame_id);
        let len = len.min(MAX_BLOCK);
        self.samples.clear();
        self.samples.extend(std::iter::repeat_n(level, len));
        self.frame_id = Some(frame_id);
        self.produced_at = Some(Instant::now());
    }

    /// True if every sample matches the frame id. A block mixing two write
    /// cycles fails this check.
    #[must_use]
    #[allow(clippy::float_cmp)] // Bit-identical by construction.
    pub fn is_consistent(&self) -> bool {
        match self.frame_id {
            None => self.samples.iter().all(|&s| s == 0.0),
            Some(id) => {
                let level = Self::level(id);
                self.samples.iter().all(|&s| s == level)
            }
        }
    }
}
