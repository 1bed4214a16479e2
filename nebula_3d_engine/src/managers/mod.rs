/// Engine managers
///
/// One manager per GPU-side concern: meshes, materials, objects, skinning,
/// lights, views and indirect command buffers. The [`Managers`] aggregate is
/// the explicit replacement for the original's `ManagerInterface` - it is
/// constructed once and passed by reference wherever the scene or the passes
/// need manager access. No hidden process-wide state.

pub mod view_manager;
pub mod mesh_manager;
pub mod material_manager;
pub mod object_manager;
pub mod skinning_manager;
pub mod light_manager;
pub mod indirect_commands;

pub use view_manager::{RenderView, ViewFlags, ViewId, ViewManager};
pub use mesh_manager::MeshManager;
pub use material_manager::MaterialManager;
pub use object_manager::ObjectManager;
pub use skinning_manager::SkinningManager;
pub use light_manager::{LightAdded, LightManager};
pub use indirect_commands::{IndirectCommandBufferManager, IndirectWorkload};

use crate::error::Result;
use crate::resources::GpuServices;
use crate::settings::SettingsStore;

/// Aggregate of every manager, owned by the render engine
pub struct Managers {
    pub views: ViewManager,
    pub mesh: MeshManager,
    pub materials: MaterialManager,
    pub objects: ObjectManager,
    pub skinning: SkinningManager,
    pub lights: LightManager,
    pub indirect: IndirectCommandBufferManager,
}

impl Managers {
    pub fn new(gpu: &mut GpuServices, settings: &SettingsStore) -> Result<Self> {
        Ok(Self {
            views: ViewManager::new(gpu)?,
            mesh: MeshManager::new(gpu)?,
            materials: MaterialManager::new(gpu)?,
            objects: ObjectManager::new(gpu)?,
            skinning: SkinningManager::new(gpu)?,
            lights: LightManager::new(gpu, settings)?,
            indirect: IndirectCommandBufferManager::new(),
        })
    }
}
