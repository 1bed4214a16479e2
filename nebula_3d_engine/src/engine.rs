/// Render engine - owns every subsystem and drives the frame loop
///
/// The explicit replacement for the original's singleton managers: the
/// engine constructs the resource manager, upload/deletion/readback
/// managers, the `Managers` aggregate, the ECS world and the render graph,
/// and passes them down by reference. No hidden process-wide state.
///
/// Frame order: fence wait for the frame slot -> recycle matured slots and
/// deletions -> skeleton/bone uploads -> queued pool copies -> queued
/// uploads -> graph prepare (input-hash cache + compile) -> graph execute
/// -> frame fence signal -> readback poll.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::ecs::World;
use crate::managers::Managers;
use crate::render_graph::{ExecutionContext, RenderGraph};
use crate::resources::{
    DeletionManager, FrameTick, GpuServices, ReadbackManager, ResourceManager, UploadManager,
};
use crate::rhi::{Device, FenceHandle, QueueKind};
use crate::scene::Scene;
use crate::settings::SettingsStore;

/// Hard timeout on frame fence waits before declaring the device lost
const FRAME_FENCE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct RenderEngine {
    device: Arc<Mutex<dyn Device>>,
    settings: SettingsStore,
    resources: ResourceManager,
    upload: UploadManager,
    deletion: DeletionManager,
    readback: ReadbackManager,
    managers: Managers,
    world: World,
    graph: RenderGraph,
    frame: u64,
    frames_in_flight: u8,
    frame_fence: Arc<dyn FenceHandle>,
    device_lost: bool,
}

impl RenderEngine {
    /// Bring up the engine on a device.
    ///
    /// # Errors
    ///
    /// Configuration errors when the device lacks required capabilities.
    pub fn new(device: Arc<Mutex<dyn Device>>, settings: SettingsStore) -> Result<Self> {
        let frames_in_flight = settings.get(|s| s.num_frames_in_flight).max(1);

        let mut resources = ResourceManager::new(device.clone(), frames_in_flight)?;
        let mut upload = UploadManager::new(device.clone(), frames_in_flight as usize)?;
        let mut deletion = DeletionManager::new(u64::from(frames_in_flight));
        let readback = ReadbackManager::new(device.clone())?;

        let managers = {
            let mut gpu = GpuServices {
                resources: &mut resources,
                upload: &mut upload,
                deletion: &mut deletion,
                tick: FrameTick { frame: 0, slot: 0 },
            };
            Managers::new(&mut gpu, &settings)?
        };

        let mut graph = RenderGraph::new(device.clone());
        graph.setup(frames_in_flight)?;

        let frame_fence = {
            let mut dev = device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.create_fence(0)?
        };

        crate::engine_info!("nebula3d::RenderEngine",
            "Engine initialized ({} frames in flight)", frames_in_flight);

        Ok(Self {
            device,
            settings,
            resources,
            upload,
            deletion,
            readback,
            managers,
            world: World::new(),
            graph,
            frame: 0,
            frames_in_flight,
            frame_fence,
            device_lost: false,
        })
    }

    // ===== ACCESS =====

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn managers(&self) -> &Managers {
        &self.managers
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.graph
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn readback_mut(&mut self) -> &mut ReadbackManager {
        &mut self.readback
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    fn tick(&self) -> FrameTick {
        FrameTick {
            frame: self.frame,
            slot: (self.frame % u64::from(self.frames_in_flight)) as usize,
        }
    }

    /// Borrow the resource-side services as one bundle
    pub fn with_gpu_services<R>(
        &mut self,
        f: impl FnOnce(&mut GpuServices<'_>, &mut Managers, &mut World) -> R,
    ) -> R {
        let tick = self.tick();
        let mut gpu = GpuServices {
            resources: &mut self.resources,
            upload: &mut self.upload,
            deletion: &mut self.deletion,
            tick,
        };
        f(&mut gpu, &mut self.managers, &mut self.world)
    }

    // ===== SCENES =====

    /// Activate a scene: registers its entities with the managers
    pub fn activate_scene(&mut self, scene: &mut Scene) -> Result<()> {
        let tick = self.tick();
        let mut gpu = GpuServices {
            resources: &mut self.resources,
            upload: &mut self.upload,
            deletion: &mut self.deletion,
            tick,
        };
        scene.activate(&mut self.world, &mut gpu, &mut self.managers)
    }

    /// Deactivate a scene, detaching its entities from the managers
    pub fn deactivate_scene(&mut self, scene: &mut Scene) -> Result<()> {
        let tick = self.tick();
        let mut gpu = GpuServices {
            resources: &mut self.resources,
            upload: &mut self.upload,
            deletion: &mut self.deletion,
            tick,
        };
        scene.deactivate(&mut self.world, &mut gpu, &mut self.managers)
    }

    // ===== FRAME LOOP =====

    /// Record and submit one frame.
    ///
    /// All uploads queued before this call are visible to the frame's
    /// rendering. Execution errors set the device-lost flag and halt
    /// further rendering.
    pub fn render_frame(&mut self) -> Result<()> {
        if self.device_lost {
            engine_bail!(DeviceLost, "nebula3d::RenderEngine",
                "rendering halted after device loss");
        }

        self.frame += 1;
        let tick = self.tick();
        self.resources.begin_frame(self.frame);

        // Wait until this frame slot's previous submission has drained
        if self.frame > u64::from(self.frames_in_flight) {
            let wait_value = self.frame - u64::from(self.frames_in_flight);
            match self.frame_fence.wait(wait_value, FRAME_FENCE_TIMEOUT) {
                Ok(true) => {}
                Ok(false) => {
                    self.device_lost = true;
                    engine_bail!(DeviceLost, "nebula3d::RenderEngine",
                        "frame fence timed out after {:?}", FRAME_FENCE_TIMEOUT);
                }
                Err(err) => {
                    self.device_lost = true;
                    return Err(err);
                }
            }
            self.upload.on_frame_complete(tick.slot);
        }
        self.deletion.process(self.frame);

        // Refresh dirty skeletons into the bone-matrix pool
        {
            let mut gpu = GpuServices {
                resources: &mut self.resources,
                upload: &mut self.upload,
                deletion: &mut self.deletion,
                tick,
            };
            self.managers.skinning.update_dirty_skeletons(&mut gpu)?;
        }

        // Queued pool copies land before this frame's data uploads
        self.upload.execute_resource_copies(tick.slot)?;
        self.upload.process_uploads(tick.slot, None)?;

        // Input-hash cache decides what re-declares; compile if needed
        self.graph.prepare(&self.world)?;

        let mut execution = ExecutionContext {
            world: &self.world,
            managers: &self.managers,
            frame: tick,
            settings: self.settings.snapshot(),
        };
        if let Err(err) = self.graph.execute(&mut execution) {
            self.device_lost = true;
            crate::engine_error!("nebula3d::RenderEngine",
                "frame {} execution failed: {}", self.frame, err);
            return Err(err);
        }

        // Signal the frame fence so slot reuse and ring release can gate
        {
            let mut dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.submit(
                QueueKind::Graphics,
                &mut [],
                Some((&self.frame_fence, self.frame)),
            )?;
        }

        self.readback.poll()?;
        Ok(())
    }

    /// Drain the GPU and release everything pending
    pub fn shutdown(&mut self) -> Result<()> {
        {
            let dev = self
                .device
                .lock()
                .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
            dev.wait_idle()?;
        }
        self.readback.flush()?;
        self.graph.cleanup();
        self.deletion.drain();
        crate::engine_info!("nebula3d::RenderEngine", "Engine shut down");
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
