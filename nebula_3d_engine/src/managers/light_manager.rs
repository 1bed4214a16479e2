/// Light manager
///
/// Per-light constant pool, per-light shadow views, shadow map allocation
/// and the view-space light cluster grid. Shadow-casting lights receive a
/// depth map (6 slices for point lights, one per cascade for directional
/// lights, 1 for spot lights) and one render view per slice.

use bytemuck::bytes_of;
use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::camera::camera::cascade_splits;
use crate::ecs::components::{DepthMap, Light, LightType, LightViewInfo};
use crate::ecs::Entity;
use crate::error::Result;
use crate::resources::{
    BufferView, DynamicBuffer, GpuBuffer, GpuServices, TextureDescription,
};
use crate::rhi::{Format, ResourceState, SamplerDesc, CompareOp, Filter, MipFilter, AddressMode, BorderPreset, ReductionMode};
use crate::settings::{SettingWatcher, SettingsStore};
use crate::shader_buffers::{
    LightCB, LightClusterCB, LIGHT_TYPE_DIRECTIONAL, LIGHT_TYPE_POINT, LIGHT_TYPE_SPOT,
};
use super::view_manager::{build_view_cb, ViewFlags, ViewManager};

/// Cluster grid dimensions in view space (x, y, depth slices)
pub const CLUSTER_GRID_DIMS: (u32, u32, u32) = (16, 9, 24);
/// Capacity of the cluster -> light index page buffer
const CLUSTER_LIGHT_INDEX_CAPACITY: u64 = 64 * 1024;

/// Everything attached to an entity when its light is registered
pub struct LightAdded {
    pub light_view_info: LightViewInfo,
    pub shadow_map: Option<DepthMap>,
}

struct LightRecord {
    light_view: BufferView,
    view_ids: Vec<super::view_manager::ViewId>,
}

pub struct LightManager {
    light_pool: DynamicBuffer,
    records: FxHashMap<Entity, LightRecord>,
    /// Uniform grid of light clusters in view space
    cluster_buffer: Arc<GpuBuffer>,
    /// Paged cluster -> light index lists
    cluster_light_indices: Arc<GpuBuffer>,
    shadow_resolution: SettingWatcher<u16>,
    num_cascades: SettingWatcher<u8>,
    max_shadow_distance: SettingWatcher<f32>,
    /// Written back with the cascade splits whenever directional views build
    settings: SettingsStore,
    total_shadow_slices: u32,
}

impl LightManager {
    pub fn new(gpu: &mut GpuServices, settings: &SettingsStore) -> Result<Self> {
        let light_pool = gpu.resources.create_indexed_dynamic_buffer(
            std::mem::size_of::<LightCB>() as u32,
            16,
            ResourceState::AllSrv,
            "LightBuffers",
            false,
            false,
        )?;
        let cluster_count =
            u64::from(CLUSTER_GRID_DIMS.0) * u64::from(CLUSTER_GRID_DIMS.1)
                * u64::from(CLUSTER_GRID_DIMS.2);
        let cluster_buffer = gpu.resources.create_buffer(&crate::resources::BufferCreateInfo {
            size: cluster_count * std::mem::size_of::<LightClusterCB>() as u64,
            element_size: std::mem::size_of::<LightClusterCB>() as u32,
            wants_uav: true,
            initial_state: ResourceState::UnorderedAccess,
            name: "LightClusters".to_string(),
            ..crate::resources::BufferCreateInfo::structured(0, 0, "")
        })?;
        let cluster_light_indices =
            gpu.resources.create_buffer(&crate::resources::BufferCreateInfo {
                size: CLUSTER_LIGHT_INDEX_CAPACITY * 4,
                element_size: 4,
                wants_uav: true,
                with_counter: true,
                initial_state: ResourceState::UnorderedAccess,
                name: "ClusterLightIndices".to_string(),
                ..crate::resources::BufferCreateInfo::structured(0, 0, "")
            })?;

        Ok(Self {
            light_pool,
            records: FxHashMap::default(),
            cluster_buffer,
            cluster_light_indices,
            shadow_resolution: settings.watch(|s| s.shadow_resolution),
            num_cascades: settings.watch(|s| s.num_directional_light_cascades),
            max_shadow_distance: settings.watch(|s| s.max_shadow_distance),
            settings: settings.clone(),
            total_shadow_slices: 0,
        })
    }

    /// Register a light. Shadow casters get a depth map and one render view
    /// per face/cascade; the light constants embed the first view's index.
    pub fn add_light(
        &mut self,
        gpu: &mut GpuServices,
        views: &mut ViewManager,
        entity: Entity,
        light: &Light,
    ) -> Result<LightAdded> {
        let slice_count = match light.light_type {
            LightType::Point => 6,
            LightType::Directional => u32::from(self.num_cascades.get()),
            LightType::Spot => 1,
        };

        let (shadow_map, view_ids) = if light.casts_shadows {
            let shadow_map = self.create_shadow_map(gpu, slice_count)?;
            let view_ids = self.create_light_views(gpu, views, light, slice_count)?;
            for &id in &view_ids {
                views.attach_depth(
                    id,
                    shadow_map.depth.clone(),
                    shadow_map.linear_depth.clone(),
                )?;
            }
            self.total_shadow_slices += slice_count;
            (Some(shadow_map), view_ids)
        } else {
            (None, Vec::new())
        };

        let first_view_index = view_ids
            .first()
            .and_then(|&id| views.view(id))
            .map(|v| v.view_cb_index())
            .unwrap_or(u32::MAX);

        let cb = build_light_cb(light, &shadow_map, first_view_index, slice_count);
        let light_view = self.light_pool.add_data(gpu, bytes_of(&cb))?;
        let light_buffer_slot = light_view.element_offset() as u32;

        self.records.insert(
            entity,
            LightRecord {
                light_view,
                view_ids: view_ids.clone(),
            },
        );

        Ok(LightAdded {
            light_view_info: LightViewInfo {
                light_buffer_slot,
                view_buffer_slot: first_view_index,
                view_ids,
            },
            shadow_map,
        })
    }

    /// Remove a light, releasing its views and shadow slices
    pub fn remove_light(&mut self, views: &mut ViewManager, entity: Entity) {
        if let Some(record) = self.records.remove(&entity) {
            self.light_pool.deallocate(&record.light_view);
            self.total_shadow_slices -= record.view_ids.len() as u32;
            for id in record.view_ids {
                views.remove_view(id);
            }
        }
    }

    pub fn light_count(&self) -> usize {
        self.records.len()
    }

    /// Total depth slices across all shadow-casting lights
    pub fn shadow_slice_count(&self) -> u32 {
        self.total_shadow_slices
    }

    pub fn light_pool_srv_index(&self) -> u32 {
        self.light_pool.srv_index()
    }

    pub fn cluster_buffer(&self) -> &Arc<GpuBuffer> {
        &self.cluster_buffer
    }

    pub fn cluster_light_indices(&self) -> &Arc<GpuBuffer> {
        &self.cluster_light_indices
    }

    // ===== INTERNALS =====

    fn create_shadow_map(&self, gpu: &mut GpuServices, slices: u32) -> Result<DepthMap> {
        let resolution = u32::from(self.shadow_resolution.get());
        let comparison_sampler = SamplerDesc {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: MipFilter::Nearest,
            address_u: AddressMode::ClampToBorder,
            address_v: AddressMode::ClampToBorder,
            address_w: AddressMode::ClampToBorder,
            lod_min: 0.0,
            lod_max: 0.0,
            border: BorderPreset::OpaqueWhite,
            compare: Some(CompareOp::LessOrEqual),
            reduction: ReductionMode::WeightedAverage,
            max_anisotropy: 1,
        };
        let depth = gpu.resources.create_texture(
            &TextureDescription {
                width: resolution,
                height: resolution,
                mip_levels: 1,
                array_layers: slices,
                cubemap: false,
                format: Format::D32_FLOAT,
                has_srv: true,
                has_uav: false,
                has_rtv: false,
                has_dsv: true,
                per_mip_srvs: false,
                initial_state: ResourceState::DepthWrite,
                sampler: Some(comparison_sampler),
                name: "ShadowDepth".to_string(),
            },
            &[],
        )?;
        let linear_depth = gpu.resources.create_texture(
            &TextureDescription {
                width: resolution,
                height: resolution,
                mip_levels: 1,
                array_layers: slices,
                cubemap: false,
                format: Format::R32_FLOAT,
                has_srv: true,
                has_uav: false,
                has_rtv: true,
                has_dsv: false,
                per_mip_srvs: false,
                initial_state: ResourceState::RenderTarget,
                sampler: Some(SamplerDesc::default()),
                name: "ShadowLinearDepth".to_string(),
            },
            &[],
        )?;
        Ok(DepthMap {
            depth,
            linear_depth,
        })
    }

    fn create_light_views(
        &self,
        gpu: &mut GpuServices,
        views: &mut ViewManager,
        light: &Light,
        slices: u32,
    ) -> Result<Vec<super::view_manager::ViewId>> {
        let position = Vec3::from_array(light.bounding_sphere.center);
        let mut ids = Vec::with_capacity(slices as usize);
        match light.light_type {
            LightType::Point => {
                let projection =
                    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.05, light.range);
                for face in cube_face_directions() {
                    let view = Mat4::look_at_rh(position, position + face.0, face.1);
                    let cb = build_view_cb(view, projection, position.extend(1.0), 0.05,
                        light.range);
                    ids.push(views.create_view_with_cb(gpu, cb, ViewFlags::SHADOW_VIEW)?);
                }
            }
            LightType::Spot => {
                let fov = (light.outer_cone_angle * 2.0)
                    .clamp(0.01, std::f32::consts::PI - 0.01);
                let projection = Mat4::perspective_rh(fov, 1.0, 0.05, light.range);
                let view = Mat4::look_at_rh(
                    position,
                    position + light.direction.normalize_or_zero(),
                    up_for(light.direction),
                );
                let cb = build_view_cb(view, projection, position.extend(1.0), 0.05, light.range);
                ids.push(views.create_view_with_cb(gpu, cb, ViewFlags::SHADOW_VIEW)?);
            }
            LightType::Directional => {
                // One orthographic view per cascade, sized by the practical
                // split scheme over the shadow range
                let splits = cascade_splits(slices as u8, 0.1, self.max_shadow_distance.get());
                self.settings
                    .update(|s| s.directional_light_cascade_splits = splits.clone());
                let direction = light.direction.normalize_or_zero();
                for (i, &far) in splits.iter().enumerate() {
                    let near = if i == 0 { 0.1 } else { splits[i - 1] };
                    let extent = far;
                    let center = -direction * (far * 0.5);
                    let view = Mat4::look_at_rh(center, center + direction, up_for(direction));
                    let projection = Mat4::orthographic_rh(
                        -extent, extent, -extent, extent, -far, far,
                    );
                    let cb = build_view_cb(view, projection, center.extend(1.0), near, far);
                    ids.push(views.create_view_with_cb(gpu, cb, ViewFlags::SHADOW_VIEW)?);
                }
            }
        }
        Ok(ids)
    }
}

fn build_light_cb(
    light: &Light,
    shadow_map: &Option<DepthMap>,
    first_view_index: u32,
    slice_count: u32,
) -> LightCB {
    LightCB {
        color: light.color,
        position: Vec4::from((Vec3::from_array(light.bounding_sphere.center), 1.0)),
        direction: Vec4::from((light.direction, 0.0)),
        light_type: match light.light_type {
            LightType::Point => LIGHT_TYPE_POINT,
            LightType::Spot => LIGHT_TYPE_SPOT,
            LightType::Directional => LIGHT_TYPE_DIRECTIONAL,
        },
        intensity: light.intensity,
        attenuation_constant: light.attenuation.x,
        attenuation_linear: light.attenuation.y,
        attenuation_quadratic: light.attenuation.z,
        inner_cone_cos: light.inner_cone_angle.cos(),
        outer_cone_cos: light.outer_cone_angle.cos(),
        range: light.range,
        shadow_view_index: first_view_index,
        shadow_map_index: shadow_map
            .as_ref()
            .map(|m| m.depth.srv_slot())
            .unwrap_or(u32::MAX),
        num_cascades: if light.light_type == LightType::Directional {
            slice_count
        } else {
            0
        },
        _pad: 0,
        bounding_sphere: light.bounding_sphere,
    }
}

/// Forward/up pairs for the 6 cube faces (+X, -X, +Y, -Y, +Z, -Z)
fn cube_face_directions() -> [(Vec3, Vec3); 6] {
    [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ]
}

/// A stable up vector for arbitrary directions
fn up_for(direction: Vec3) -> Vec3 {
    if direction.normalize_or_zero().dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[cfg(test)]
#[path = "light_manager_tests.rs"]
mod tests;
