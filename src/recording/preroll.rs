// Pre-roll buffer management
// Maintains a rolling window of recent frames to include when recording starts

use std::collections::VecDeque;
use std::sync::Arc;

use crate::video::Frame;

/// Rolling buffer holding the most recent `capacity` frames, oldest first
pub struct FramePrerollBuffer {
    frames: VecDeque<Arc<Frame>>,
    capacity: usize,
}

impl FramePrerollBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest ones beyond capacity
    pub fn push(&mut self, frame: Arc<Frame>) {
        self.frames.push_back(frame);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// Buffered frames, oldest to newest. The buffer keeps its contents.
    pub fn frames(&self) -> impl Iterator<Item = &Arc<Frame>> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
