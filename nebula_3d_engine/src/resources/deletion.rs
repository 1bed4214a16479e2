/// Deferred deletion manager
///
/// Resources marked for deletion stay alive for `num_frames_in_flight`
/// frames so in-flight command lists never reference freed memory. The
/// engine calls [`DeletionManager::process`] once per frame.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::rhi::{BufferHandle, TextureHandle};
use super::buffer::GpuBuffer;
use super::pixel_buffer::PixelBuffer;

/// A resource parked until its in-flight window closes
pub enum DeferredRelease {
    Buffer(Arc<dyn BufferHandle>),
    Texture(Arc<dyn TextureHandle>),
    EngineBuffer(Arc<GpuBuffer>),
    EngineTexture(Arc<PixelBuffer>),
}

pub struct DeletionManager {
    queue: VecDeque<(u64, DeferredRelease)>,
    frames_in_flight: u64,
}

impl DeletionManager {
    pub fn new(frames_in_flight: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            frames_in_flight,
        }
    }

    /// Park a resource; it is dropped once `current_frame + frames_in_flight`
    /// frames have begun.
    pub fn mark_for_delete(&mut self, release: DeferredRelease, current_frame: u64) {
        self.queue
            .push_back((current_frame + self.frames_in_flight, release));
    }

    /// Drop every parked resource whose release frame has been reached.
    ///
    /// Returns the number of resources released.
    pub fn process(&mut self, current_frame: u64) -> usize {
        let mut released = 0;
        while let Some((release_frame, _)) = self.queue.front() {
            if *release_frame > current_frame {
                break;
            }
            self.queue.pop_front();
            released += 1;
        }
        released
    }

    /// Number of resources still parked
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop everything immediately (engine shutdown, after wait_idle)
    pub fn drain(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
#[path = "deletion_tests.rs"]
mod tests;
