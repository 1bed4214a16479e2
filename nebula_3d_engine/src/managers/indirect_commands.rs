/// Indirect command buffer manager
///
/// Maps (view, render phase, compile flags) to a UAV-counter-backed append
/// buffer of indirect commands. GPU culling appends commands; pass
/// execution consumes them with one `execute_indirect` per workload. Each
/// workload buffer is wrapped in an `IsIndirectArguments` ECS entity so the
/// render graph can discover indirect-argument usage by query at build time.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::ecs::components::{IndirectArgumentsRef, IsIndirectArguments};
use crate::ecs::{Entity, RenderPhase, World};
use crate::error::Result;
use crate::material::{CompileFlags, TechniqueDescriptor};
use crate::resources::{BufferCreateInfo, GpuBuffer, GpuServices};
use crate::rhi::{BufferUsage, HeapType, ResourceState};
use crate::shader_buffers::IndirectDispatchMeshCommand;
use super::view_manager::ViewId;

/// Byte stride of one indirect command
pub const INDIRECT_COMMAND_STRIDE: u32 =
    std::mem::size_of::<IndirectDispatchMeshCommand>() as u32;

const INITIAL_COMMAND_CAPACITY: u32 = 64;

/// One (view, phase, compile flags) workload
pub struct IndirectWorkload {
    pub buffer: Arc<GpuBuffer>,
    /// Commands the buffer can hold
    pub capacity: u32,
    /// ECS entity wrapping the buffer for graph discovery
    pub entity: Entity,
}

impl IndirectWorkload {
    /// Byte offset of the UAV append counter within the buffer
    pub fn counter_offset(&self) -> u64 {
        self.buffer.counter_offset().unwrap_or(0)
    }
}

type WorkloadKey = (ViewId, u64, CompileFlags);

pub struct IndirectCommandBufferManager {
    workloads: FxHashMap<WorkloadKey, IndirectWorkload>,
    /// Techniques registered so far, keyed by technique hash
    techniques: FxHashMap<u64, TechniqueDescriptor>,
    /// Views workloads are maintained for
    views: Vec<ViewId>,
}

impl IndirectCommandBufferManager {
    pub fn new() -> Self {
        Self {
            workloads: FxHashMap::default(),
            techniques: FxHashMap::default(),
            views: Vec::new(),
        }
    }

    /// Start maintaining workloads for a view (camera or shadow view)
    pub fn register_view(
        &mut self,
        gpu: &mut GpuServices,
        world: &mut World,
        view: ViewId,
    ) -> Result<()> {
        if self.views.contains(&view) {
            return Ok(());
        }
        self.views.push(view);
        let techniques: Vec<TechniqueDescriptor> = self.techniques.values().cloned().collect();
        for technique in techniques {
            self.ensure_workloads(gpu, world, &technique, INITIAL_COMMAND_CAPACITY)?;
        }
        Ok(())
    }

    /// Ensure all (phase, compile flags) pairs a technique names have an
    /// allocated workload for every registered view
    pub fn register_technique(
        &mut self,
        gpu: &mut GpuServices,
        world: &mut World,
        technique: &TechniqueDescriptor,
    ) -> Result<()> {
        self.techniques
            .insert(technique.hash64(), technique.clone());
        self.ensure_workloads(gpu, world, technique, INITIAL_COMMAND_CAPACITY)
    }

    /// Grow the technique's workloads to hold at least `draw_count` commands
    pub fn update_buffers_for_technique(
        &mut self,
        gpu: &mut GpuServices,
        world: &mut World,
        technique: &TechniqueDescriptor,
        draw_count: u32,
    ) -> Result<()> {
        self.ensure_workloads(gpu, world, technique, draw_count)
    }

    /// Workloads of one (view, phase), as (compile flags, workload) pairs
    pub fn buffers_for_render_phase(
        &self,
        view: ViewId,
        phase: RenderPhase,
    ) -> Vec<(CompileFlags, &IndirectWorkload)> {
        let mut out: Vec<(CompileFlags, &IndirectWorkload)> = self
            .workloads
            .iter()
            .filter(|((v, p, _), _)| *v == view && *p == phase.hash)
            .map(|((_, _, flags), workload)| (*flags, workload))
            .collect();
        out.sort_by_key(|(flags, _)| *flags);
        out
    }

    /// Release every workload owned by a view
    pub fn unregister_buffers(&mut self, world: &mut World, owner: ViewId) {
        self.views.retain(|&v| v != owner);
        let keys: Vec<WorkloadKey> = self
            .workloads
            .keys()
            .filter(|(v, _, _)| *v == owner)
            .copied()
            .collect();
        for key in keys {
            if let Some(workload) = self.workloads.remove(&key) {
                world.destroy_entity(workload.entity);
            }
        }
    }

    pub fn workload_count(&self) -> usize {
        self.workloads.len()
    }

    pub fn workload(
        &self,
        view: ViewId,
        phase: RenderPhase,
        flags: CompileFlags,
    ) -> Option<&IndirectWorkload> {
        self.workloads.get(&(view, phase.hash, flags))
    }

    // ===== INTERNALS =====

    fn ensure_workloads(
        &mut self,
        gpu: &mut GpuServices,
        world: &mut World,
        technique: &TechniqueDescriptor,
        command_capacity: u32,
    ) -> Result<()> {
        for participation in technique.participations() {
            for view in self.views.clone() {
                let key = (view, participation.phase.hash, participation.compile_flags);
                let needs_grow = match self.workloads.get(&key) {
                    Some(workload) => workload.capacity < command_capacity,
                    None => true,
                };
                if !needs_grow {
                    continue;
                }
                let capacity = command_capacity
                    .next_power_of_two()
                    .max(INITIAL_COMMAND_CAPACITY);
                let buffer = gpu.resources.create_buffer(&BufferCreateInfo {
                    size: u64::from(capacity) * u64::from(INDIRECT_COMMAND_STRIDE),
                    heap: HeapType::Default,
                    usage: BufferUsage::STORAGE | BufferUsage::INDIRECT,
                    element_size: INDIRECT_COMMAND_STRIDE,
                    wants_srv: false,
                    wants_uav: true,
                    wants_cbv: false,
                    with_counter: true,
                    initial_state: ResourceState::IndirectArgument,
                    name: format!(
                        "Indirect:{}:{:x}",
                        participation.phase.name, participation.compile_flags.0
                    ),
                })?;

                match self.workloads.get_mut(&key) {
                    Some(workload) => {
                        // Grown in place: retire the old buffer, repoint the
                        // discovery entity at the new one
                        let old = workload.buffer.clone();
                        gpu.resources.destroy_buffer(old, gpu.deletion);
                        workload.buffer = buffer.clone();
                        workload.capacity = capacity;
                        world.insert(workload.entity, IndirectArgumentsRef(buffer));
                    }
                    None => {
                        let entity = world.create_entity();
                        world.insert(entity, IsIndirectArguments);
                        world.insert(entity, IndirectArgumentsRef(buffer.clone()));
                        self.workloads.insert(
                            key,
                            IndirectWorkload {
                                buffer,
                                capacity,
                                entity,
                            },
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for IndirectCommandBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "indirect_commands_tests.rs"]
mod tests;
