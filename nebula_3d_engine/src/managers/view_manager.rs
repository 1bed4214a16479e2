/// View manager
///
/// A view is the unit of culling and indirect drawing: the primary camera
/// and every shadow face/cascade each own one. Views hold a slot in the
/// shared view constant pool, an optional depth/linear-depth target pair,
/// and a per-meshlet visibility bitfield sized to the meshlet slots of the
/// draws bound to the view.

use bitflags::bitflags;
use bytemuck::bytes_of;
use glam::{Mat4, Vec4};
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

use crate::camera::{Camera, CameraInfo, Frustum};
use crate::engine_bail;
use crate::error::Result;
use crate::resources::{BufferView, DynamicBuffer, GpuServices, PixelBuffer};
use crate::rhi::ResourceState;
use crate::shader_buffers::ViewCB;

new_key_type! {
    /// Stable key of a render view
    pub struct ViewId;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViewFlags: u32 {
        const PRIMARY_CAMERA = 1 << 0;
        const SHADOW_VIEW    = 1 << 1;
    }
}

/// One render view
pub struct RenderView {
    cb: ViewCB,
    flags: ViewFlags,
    /// Slot in the view constant pool
    view_cb_view: BufferView,
    depth: Option<Arc<PixelBuffer>>,
    linear_depth: Option<Arc<PixelBuffer>>,
    /// This view's slice of the meshlet-culling bitfield pool
    meshlet_bitfield: Option<BufferView>,
    /// Meshlet slots currently covered by the bitfield
    meshlet_slot_count: u64,
}

impl RenderView {
    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn cb(&self) -> &ViewCB {
        &self.cb
    }

    /// Element index of this view's constants in the view pool, passed to
    /// shaders through the View root parameter
    pub fn view_cb_index(&self) -> u32 {
        self.view_cb_view.element_offset() as u32
    }

    pub fn depth(&self) -> Option<&Arc<PixelBuffer>> {
        self.depth.as_ref()
    }

    pub fn linear_depth(&self) -> Option<&Arc<PixelBuffer>> {
        self.linear_depth.as_ref()
    }

    pub fn meshlet_slot_count(&self) -> u64 {
        self.meshlet_slot_count
    }

    pub fn meshlet_bitfield(&self) -> Option<&BufferView> {
        self.meshlet_bitfield.as_ref()
    }
}

pub struct ViewManager {
    views: SlotMap<ViewId, RenderView>,
    /// Pool of `ViewCB` entries shared by cameras and light views
    view_pool: DynamicBuffer,
    /// Raw pool backing every view's meshlet-visibility bitfield
    bitfield_pool: DynamicBuffer,
}

impl ViewManager {
    pub fn new(gpu: &mut GpuServices) -> Result<Self> {
        let view_pool = gpu.resources.create_indexed_dynamic_buffer(
            std::mem::size_of::<ViewCB>() as u32,
            16,
            ResourceState::AllSrv,
            "ViewBuffers",
            false,
            false,
        )?;
        let bitfield_pool = gpu.resources.create_indexed_dynamic_buffer(
            1,
            4096,
            ResourceState::UnorderedAccess,
            "MeshletCullingBitfields",
            true,
            false,
        )?;
        Ok(Self {
            views: SlotMap::with_key(),
            view_pool,
            bitfield_pool,
        })
    }

    /// Create a view from a camera description
    pub fn create_view(
        &mut self,
        gpu: &mut GpuServices,
        camera: &CameraInfo,
        flags: ViewFlags,
    ) -> Result<ViewId> {
        let camera = Camera::new(*camera);
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let cb = build_view_cb(
            view,
            projection,
            camera.position().extend(1.0),
            camera.info().near,
            camera.info().far,
        );
        self.create_view_with_cb(gpu, cb, flags)
    }

    /// Create a view from precomputed constants (light faces/cascades)
    pub fn create_view_with_cb(
        &mut self,
        gpu: &mut GpuServices,
        cb: ViewCB,
        flags: ViewFlags,
    ) -> Result<ViewId> {
        let view_cb_view = self.view_pool.add_data(gpu, bytes_of(&cb))?;
        Ok(self.views.insert(RenderView {
            cb,
            flags,
            view_cb_view,
            depth: None,
            linear_depth: None,
            meshlet_bitfield: None,
            meshlet_slot_count: 0,
        }))
    }

    /// Re-upload a view's constants (camera motion, cascade rebuild)
    pub fn update_view_cb(&mut self, gpu: &mut GpuServices, id: ViewId, cb: ViewCB) -> Result<()> {
        let Some(view) = self.views.get_mut(id) else {
            engine_bail!(InvalidResource, "nebula3d::ViewManager", "unknown view id");
        };
        view.cb = cb;
        self.view_pool.update_view(gpu, &view.view_cb_view, bytes_of(&cb))
    }

    /// Attach a depth / linearized-depth target pair
    pub fn attach_depth(
        &mut self,
        id: ViewId,
        depth: Arc<PixelBuffer>,
        linear_depth: Arc<PixelBuffer>,
    ) -> Result<()> {
        let Some(view) = self.views.get_mut(id) else {
            engine_bail!(InvalidResource, "nebula3d::ViewManager", "unknown view id");
        };
        view.depth = Some(depth);
        view.linear_depth = Some(linear_depth);
        Ok(())
    }

    /// Resize the view's meshlet-culling bitfield to cover
    /// `total_meshlet_slots` meshlets (called when the view's workloads
    /// change). One bit per meshlet slot.
    pub fn resize_meshlet_bitfield(
        &mut self,
        gpu: &mut GpuServices,
        id: ViewId,
        total_meshlet_slots: u64,
    ) -> Result<()> {
        let Some(view) = self.views.get_mut(id) else {
            engine_bail!(InvalidResource, "nebula3d::ViewManager", "unknown view id");
        };
        if view.meshlet_slot_count == total_meshlet_slots {
            return Ok(());
        }
        if let Some(old) = view.meshlet_bitfield.take() {
            self.bitfield_pool.deallocate(&old);
        }
        if total_meshlet_slots > 0 {
            let bytes = total_meshlet_slots.div_ceil(8);
            view.meshlet_bitfield = Some(self.bitfield_pool.allocate(gpu, bytes)?);
        }
        view.meshlet_slot_count = total_meshlet_slots;
        Ok(())
    }

    pub fn remove_view(&mut self, id: ViewId) {
        if let Some(view) = self.views.remove(id) {
            self.view_pool.deallocate(&view.view_cb_view);
            if let Some(bitfield) = &view.meshlet_bitfield {
                self.bitfield_pool.deallocate(bitfield);
            }
        }
    }

    pub fn view(&self, id: ViewId) -> Option<&RenderView> {
        self.views.get(id)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// All views with the given flag set
    pub fn views_with_flags(&self, flags: ViewFlags) -> Vec<ViewId> {
        self.views
            .iter()
            .filter(|(_, v)| v.flags.contains(flags))
            .map(|(id, _)| id)
            .collect()
    }

    /// SRV slot of the view constant pool
    pub fn view_pool_srv_index(&self) -> u32 {
        self.view_pool.srv_index()
    }

    /// UAV slot of the meshlet bitfield pool
    pub fn bitfield_pool_uav_index(&self) -> u32 {
        self.bitfield_pool.uav_index()
    }

    pub fn bitfield_pool_srv_index(&self) -> u32 {
        self.bitfield_pool.srv_index()
    }
}

/// Assemble a `ViewCB` from matrices and pose
pub fn build_view_cb(view: Mat4, projection: Mat4, position: Vec4, near: f32, far: f32) -> ViewCB {
    let view_projection = projection * view;
    let frustum = Frustum::from_view_projection(&view_projection);
    ViewCB {
        view,
        projection,
        view_projection,
        inverse_view_projection: view_projection.inverse(),
        position,
        frustum_planes: frustum.planes,
        near_plane: near,
        far_plane: far,
        meshlet_bitfield_offset: 0,
        _pad: 0,
    }
}

#[cfg(test)]
#[path = "view_manager_tests.rs"]
mod tests;
