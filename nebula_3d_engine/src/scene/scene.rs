/// Scene - an ECS subtree plus activation bookkeeping
///
/// A scene owns a root entity and composes child scenes. Creating entities
/// only touches the ECS; `activate` is where entities meet the managers:
/// materials get slots, meshes and instances land in the pools, lights get
/// shadow views, and every renderable receives its `PerPassMeshes`
/// partition and `ParticipatesInPass` relations. Only active scenes
/// contribute to draws.

use glam::Mat4;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::camera::CameraInfo;
use crate::ecs::components::*;
use crate::ecs::{Entity, World};
use crate::error::Result;
use crate::managers::{Managers, ViewFlags};
use crate::mesh::MeshInstance;
use crate::resources::GpuServices;
use crate::shader_buffers::PerObjectCB;

pub struct Scene {
    name: String,
    root: Entity,
    children: Vec<Scene>,
    active: bool,
}

impl Scene {
    /// Create a scene with a fresh root entity
    pub fn new(world: &mut World, name: impl Into<String>) -> Self {
        let name = name.into();
        let root = world.create_entity();
        world.insert(root, SceneRoot);
        world.insert(root, SceneNode::default());
        world.insert(root, Name(name.clone()));
        Self {
            name,
            root,
            children: Vec::new(),
            active: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Create an entity parented to the scene root
    pub fn create_entity(&self, world: &mut World) -> Entity {
        let entity = world.create_entity();
        world.insert(
            entity,
            SceneNode {
                parent: Some(self.root),
                children: Vec::new(),
            },
        );
        if let Some(node) = world.get_mut::<SceneNode>(self.root) {
            node.children.push(entity);
        }
        entity
    }

    /// Attach mesh instances and a transform, making the entity renderable
    pub fn make_renderable(
        &self,
        world: &mut World,
        entity: Entity,
        instances: Vec<Arc<MeshInstance>>,
        transform: Mat4,
    ) {
        world.insert(entity, GlobalMatrix(transform));
        world.insert(entity, MeshInstances(instances));
        world.insert(entity, RenderableObject::default());
    }

    /// Attach a light to an entity
    pub fn add_light(&self, world: &mut World, entity: Entity, light: Light) {
        world.insert(entity, light);
    }

    /// Attach a camera; the first camera in an activated scene becomes the
    /// primary camera
    pub fn add_camera(&self, world: &mut World, entity: Entity, camera: CameraInfo) {
        world.insert(
            entity,
            CameraComponent(crate::camera::Camera::new(camera)),
        );
    }

    /// Compose a child scene (a scene graph of subgraphs)
    pub fn add_child_scene(&mut self, child: Scene) {
        self.children.push(child);
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    // ===== ACTIVATION =====

    /// Register the scene's entities with the managers and mark it active
    pub fn activate(
        &mut self,
        world: &mut World,
        gpu: &mut GpuServices,
        managers: &mut Managers,
    ) -> Result<()> {
        if self.active {
            return Ok(());
        }
        world.insert(self.root, ActiveScene);

        let phase_entities = ensure_phase_entities(world);
        let entities = self.subtree(world);

        // Cameras first: views must exist before indirect workloads register
        for &entity in &entities {
            if let Some(CameraComponent(camera)) = world.get::<CameraComponent>(entity).copied() {
                let view_id =
                    managers
                        .views
                        .create_view(gpu, camera.info(), ViewFlags::PRIMARY_CAMERA)?;
                world.insert(entity, RenderViewRef(view_id));
                world.insert(entity, PrimaryCamera);
                managers.indirect.register_view(gpu, world, view_id)?;
            }
        }

        // Lights: constants, shadow maps, shadow views
        for &entity in &entities {
            if let Some(light) = world.get::<Light>(entity).copied() {
                let added = managers.lights.add_light(gpu, &mut managers.views, entity, &light)?;
                for &view_id in &added.light_view_info.view_ids {
                    managers.indirect.register_view(gpu, world, view_id)?;
                }
                world.insert(entity, added.light_view_info);
                if let Some(shadow_map) = added.shadow_map {
                    world.insert(entity, shadow_map);
                }
            }
        }

        // Renderables: materials -> meshes -> instances -> object constants
        let mut technique_draw_counts: FxHashMap<u64, u32> = FxHashMap::default();
        for &entity in &entities {
            let Some(MeshInstances(instances)) =
                world.get::<MeshInstances>(entity).cloned()
            else {
                continue;
            };

            let mut per_pass: FxHashMap<u64, Vec<Arc<MeshInstance>>> = FxHashMap::default();
            let mut participates: Vec<Entity> = Vec::new();
            let mut any_skinned = false;

            for instance in &instances {
                let mesh = instance.mesh().clone();
                let material = mesh.material.clone();

                managers.materials.increment_usage(gpu, &material)?;
                managers
                    .indirect
                    .register_technique(gpu, world, material.technique())?;

                if !managers.mesh.contains_mesh(&mesh) {
                    managers.mesh.add_mesh(gpu, &mesh, true)?;
                }
                managers.mesh.add_mesh_instance(gpu, instance, true)?;

                if let Some(skeleton) = instance.skin() {
                    let slot = managers.skinning.acquire_skinning_instance(gpu, skeleton)?;
                    instance.set_skinning_instance_slot(slot);
                    any_skinned = true;
                }

                for participation in material.technique().participations() {
                    per_pass
                        .entry(participation.phase.hash)
                        .or_default()
                        .push(instance.clone());
                    if let Some(&phase_entity) = phase_entities.get(&participation.phase.hash) {
                        if !participates.contains(&phase_entity) {
                            participates.push(phase_entity);
                        }
                    }
                }
                // One command slot per instance in every workload the
                // technique participates in
                *technique_draw_counts
                    .entry(material.technique().hash64())
                    .or_default() += 1;
            }

            let transform = world
                .get::<GlobalMatrix>(entity)
                .map(|m| m.0)
                .unwrap_or(Mat4::IDENTITY);
            let draw_info = managers.objects.add_object(
                gpu,
                entity,
                &PerObjectCB {
                    model: transform,
                    ..Default::default()
                },
            )?;
            world.insert(entity, RenderableObject { draw_info: Some(draw_info) });
            world.insert(entity, ObjectDrawInfo {
                per_object_cb_index: draw_info.per_object_cb_index,
                normal_matrix_index: draw_info.normal_matrix_index,
            });
            world.insert(entity, PerPassMeshes(per_pass));
            world.insert(entity, ParticipatesInPass(participates));
            world.insert(entity, Active);
            if any_skinned {
                world.insert(entity, Skinned);
            }
        }

        // Size the indirect workloads to the activated draw counts
        let techniques: Vec<(u64, u32)> = technique_draw_counts.into_iter().collect();
        for (hash, count) in techniques {
            // A technique's draw count is per (view, phase, flags) workload
            let technique = entities
                .iter()
                .filter_map(|&e| world.get::<MeshInstances>(e))
                .flat_map(|m| m.0.iter())
                .map(|i| i.mesh().material.technique().clone())
                .find(|t| t.hash64() == hash);
            if let Some(technique) = technique {
                managers
                    .indirect
                    .update_buffers_for_technique(gpu, world, &technique, count)?;
            }
        }

        // Per-view meshlet-culling bitfields cover every meshlet slot the
        // view's draws use; resize them now that the workloads are known
        let total_meshlet_slots: u64 = entities
            .iter()
            .filter_map(|&e| world.get::<MeshInstances>(e))
            .flat_map(|m| m.0.iter())
            .map(|instance| u64::from(instance.mesh().meshlet_count()))
            .sum();
        let mut bound_views = Vec::new();
        for &entity in &entities {
            if let Some(RenderViewRef(view_id)) = world.get::<RenderViewRef>(entity).copied() {
                bound_views.push(view_id);
            }
            if let Some(info) = world.get::<LightViewInfo>(entity) {
                bound_views.extend(info.view_ids.iter().copied());
            }
        }
        for view_id in bound_views {
            managers
                .views
                .resize_meshlet_bitfield(gpu, view_id, total_meshlet_slots)?;
        }

        for child in &mut self.children {
            child.activate(world, gpu, managers)?;
        }
        self.active = true;
        crate::engine_info!("nebula3d::Scene", "Activated scene '{}'", self.name);
        Ok(())
    }

    /// Detach the scene's entities from the managers
    pub fn deactivate(
        &mut self,
        world: &mut World,
        gpu: &mut GpuServices,
        managers: &mut Managers,
    ) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        for child in &mut self.children {
            child.deactivate(world, gpu, managers)?;
        }

        let entities = self.subtree(world);
        for &entity in &entities {
            if let Some(MeshInstances(instances)) = world.get::<MeshInstances>(entity).cloned() {
                for instance in &instances {
                    if instance.has_skin() {
                        let slot = instance.per_mesh_instance_cb().skinning_instance_slot;
                        if slot != u32::MAX {
                            managers.skinning.release_skinning_instance(slot);
                        }
                    }
                    managers.mesh.remove_mesh_instance(instance);
                    managers.materials.decrement_usage(&instance.mesh().material);
                }
                managers.objects.remove_object(entity);
                world.remove::<PerPassMeshes>(entity);
                world.remove::<ParticipatesInPass>(entity);
                world.remove::<Active>(entity);
            }
            if world.has::<Light>(entity) {
                if let Some(info) = world.remove::<LightViewInfo>(entity) {
                    for view_id in &info.view_ids {
                        managers.indirect.unregister_buffers(world, *view_id);
                    }
                }
                managers.lights.remove_light(&mut managers.views, entity);
                world.remove::<DepthMap>(entity);
            }
            if let Some(RenderViewRef(view_id)) = world.get::<RenderViewRef>(entity).copied() {
                managers.indirect.unregister_buffers(world, view_id);
                managers.views.remove_view(view_id);
                world.remove::<RenderViewRef>(entity);
            }
        }

        world.remove::<ActiveScene>(self.root);
        self.active = false;
        crate::engine_info!("nebula3d::Scene", "Deactivated scene '{}'", self.name);
        Ok(())
    }

    /// Entities of this scene's subtree (excluding the root)
    pub fn subtree(&self, world: &World) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(entity) = stack.pop() {
            if entity != self.root {
                out.push(entity);
            }
            if let Some(node) = world.get::<SceneNode>(entity) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }
}

/// Find or create the tag entities for the predefined render phases
pub fn ensure_phase_entities(world: &mut World) -> FxHashMap<u64, Entity> {
    let mut map = FxHashMap::default();
    for entity in world.query1::<RenderPhaseTag>() {
        if let Some(RenderPhaseTag(phase)) = world.get::<RenderPhaseTag>(entity) {
            map.insert(phase.hash, entity);
        }
    }
    for phase in crate::ecs::phase::PREDEFINED_PHASES {
        map.entry(phase.hash).or_insert_with(|| {
            let entity = world.create_entity();
            world.insert(entity, RenderPhaseTag(phase));
            entity
        });
    }
    map
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
