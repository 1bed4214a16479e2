//! Shared helpers for unit tests: a mock device plus the resource-side
//! service bundle most manager tests need.

use std::sync::{Arc, Mutex};

use crate::resources::{DeletionManager, FrameTick, GpuServices, ResourceManager, UploadManager};
use crate::rhi::mock_device::MockDevice;
use crate::rhi::Device;

pub(crate) fn mock_device() -> Arc<Mutex<dyn Device>> {
    Arc::new(Mutex::new(MockDevice::new()))
}

/// Owns the resource-side managers a test needs to assemble `GpuServices`
pub(crate) struct Harness {
    pub resources: ResourceManager,
    pub upload: UploadManager,
    pub deletion: DeletionManager,
}

impl Harness {
    pub fn new() -> Self {
        let device = mock_device();
        let resources = ResourceManager::new(device.clone(), 3).expect("resource manager");
        let upload = UploadManager::new(device, 3).expect("upload manager");
        let deletion = DeletionManager::new(3);
        Self {
            resources,
            upload,
            deletion,
        }
    }

    pub fn gpu(&mut self, frame: u64) -> GpuServices<'_> {
        GpuServices {
            resources: &mut self.resources,
            upload: &mut self.upload,
            deletion: &mut self.deletion,
            tick: FrameTick {
                frame,
                slot: (frame % 3) as usize,
            },
        }
    }
}
