/// Render graph compilation and execution
///
/// Compilation walks the registered passes in order and greedily packs them
/// into batches: a pass joins the current batch unless one of its declared
/// usages conflicts with the batch's accumulated resource states (a write,
/// or a read that cannot merge with the existing read). Closing a batch
/// computes the exact transitions from the previous batches' final states
/// (falling back to each resource's tracked state), and a terminal
/// loop-back batch returns every touched resource to its initial state so
/// the graph is safe to re-execute.
///
/// Execution submits, per batch, one transition command list followed by
/// the batch's passes, all on the primary queue.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::ecs::World;
use crate::resources::tracked::{intersect, subtract};
use crate::rhi::{
    BarrierDesc, BufferBarrier, CommandList, Device, QueueKind, Rect2D, ResourceState,
    ResourceTransition, SubresourceRange, TextureBarrier, Viewport,
};

use super::builder::{PassBuilder, PassResourceUsage};
use super::pass::{ExecutionContext, PassContext, RenderPass};
use super::registry::{GraphResource, ResourceId, ResourceRegistry};

// ===== STATE RANGE MAP =====

/// Disjoint (range, state) rectangles of one resource within a batch scope
#[derive(Default, Clone)]
struct StateRanges {
    pieces: Vec<(SubresourceRange, ResourceState)>,
}

impl StateRanges {
    /// Pieces overlapping `range`, clipped to it
    fn query(&self, range: &SubresourceRange) -> Vec<(SubresourceRange, ResourceState)> {
        let mut out = Vec::new();
        for (piece, state) in &self.pieces {
            if let Some(clipped) = intersect(piece, range) {
                out.push((clipped, *state));
            }
        }
        out
    }

    /// Parts of `range` no piece covers
    fn uncovered(&self, range: &SubresourceRange) -> Vec<SubresourceRange> {
        let mut remainder = vec![*range];
        for (piece, _) in &self.pieces {
            remainder = remainder
                .into_iter()
                .flat_map(|r| subtract(&r, piece))
                .collect();
        }
        remainder
    }

    /// Overwrite `range` with `state`, splitting overlapped pieces
    fn set(&mut self, range: &SubresourceRange, state: ResourceState) {
        let mut next = Vec::with_capacity(self.pieces.len() + 4);
        for (piece, piece_state) in self.pieces.drain(..) {
            if piece.overlaps(range) {
                for remainder in subtract(&piece, range) {
                    next.push((remainder, piece_state));
                }
            } else {
                next.push((piece, piece_state));
            }
        }
        next.push((*range, state));
        self.pieces = next;
    }

    /// Fold `state` into `range`, merging with overlapped read states.
    /// Callers must have verified mergeability.
    fn merge_in(&mut self, range: &SubresourceRange, state: ResourceState) {
        let overlaps = self.query(range);
        let uncovered = self.uncovered(range);
        for (piece, piece_state) in overlaps {
            let merged = piece_state.merge(state).unwrap_or(state);
            self.set(&piece, merged);
        }
        for piece in uncovered {
            self.set(&piece, state);
        }
    }
}

type StateMap = FxHashMap<ResourceId, StateRanges>;

// ===== BATCHES =====

/// A set of passes that execute without intra-batch transitions
#[derive(Default)]
pub struct PassBatch {
    /// Indices into the graph's pass list, in registration order
    pub pass_indices: Vec<usize>,
    /// Desired resource states across the batch
    resource_states: StateMap,
    /// Transitions recorded before the batch's passes run
    pub transitions: Vec<ResourceTransition<ResourceId>>,
}

impl PassBatch {
    /// Desired states of one resource within this batch (for inspection)
    pub fn states_of(&self, id: ResourceId) -> Vec<(SubresourceRange, ResourceState)> {
        self.resource_states
            .get(&id)
            .map(|r| r.pieces.clone())
            .unwrap_or_default()
    }
}

struct PassNode {
    pass: Box<dyn RenderPass>,
    name: String,
    declaration: PassResourceUsage,
    /// Declaration resolved against the registry (set during compile)
    resolved: Vec<(ResourceId, SubresourceRange, ResourceState)>,
    last_inputs_hash: Option<u64>,
    last_declaration_hash: Option<u64>,
}

// ===== GRAPH =====

pub struct RenderGraph {
    device: Arc<Mutex<dyn Device>>,
    registry: ResourceRegistry,
    passes: Vec<PassNode>,
    pass_names: FxHashMap<String, usize>,
    batches: Vec<PassBatch>,
    transition_lists: Vec<Box<dyn CommandList>>,
    pass_lists: Vec<Box<dyn CommandList>>,
    compiled: bool,
}

impl RenderGraph {
    pub fn new(device: Arc<Mutex<dyn Device>>) -> Self {
        Self {
            device,
            registry: ResourceRegistry::new(),
            passes: Vec::new(),
            pass_names: FxHashMap::default(),
            batches: Vec::new(),
            transition_lists: Vec::new(),
            pass_lists: Vec::new(),
            compiled: false,
        }
    }

    // ===== REGISTRATION =====

    /// Register a named texture the graph tracks and passes may resolve
    pub fn register_texture(
        &mut self,
        name: &str,
        texture: Arc<crate::resources::PixelBuffer>,
    ) -> Result<ResourceId> {
        self.compiled = false;
        self.registry.register_texture(name, texture)
    }

    /// Register a named buffer
    pub fn register_buffer(
        &mut self,
        name: &str,
        buffer: Arc<crate::resources::GpuBuffer>,
    ) -> Result<ResourceId> {
        self.compiled = false;
        self.registry.register_buffer(name, buffer)
    }

    /// Append a pass; passes execute in registration order
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>, name: &str) -> Result<usize> {
        if self.pass_names.contains_key(name) {
            engine_bail!(DuplicateResource, "nebula3d::RenderGraph",
                "pass '{}' already exists in this graph", name);
        }
        let index = self.passes.len();
        self.pass_names.insert(name.to_string(), index);
        self.passes.push(PassNode {
            name: name.to_string(),
            pass,
            declaration: PassResourceUsage::default(),
            resolved: Vec::new(),
            last_inputs_hash: None,
            last_declaration_hash: None,
        });
        self.compiled = false;
        Ok(index)
    }

    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.pass_names.get(name).copied()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Compiled batches (the last one is always the loop-back batch)
    pub fn batches(&self) -> &[PassBatch] {
        &self.batches
    }

    /// Create the per-frame transition and pass command lists
    pub fn setup(&mut self, frames_in_flight: u8) -> Result<()> {
        let mut device = self
            .device
            .lock()
            .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
        self.transition_lists.clear();
        self.pass_lists.clear();
        for _ in 0..frames_in_flight {
            self.transition_lists
                .push(device.create_command_list(QueueKind::Graphics)?);
            self.pass_lists
                .push(device.create_command_list(QueueKind::Graphics)?);
        }
        Ok(())
    }

    // ===== PREPARATION (input-hash caching) =====

    /// Re-declare and re-set-up passes whose inputs changed, then recompile
    /// if any declaration (or the graph structure) changed.
    ///
    /// Returns whether a recompilation happened.
    pub fn prepare(&mut self, world: &World) -> Result<bool> {
        let mut needs_compile = !self.compiled;
        for node in &mut self.passes {
            let inputs_hash = node.pass.inputs_hash();
            if node.last_inputs_hash == Some(inputs_hash) {
                continue;
            }
            let mut builder = PassBuilder::new();
            node.pass.declare_resource_usages(&mut builder)?;
            let declaration = builder.finish();
            let declaration_hash = declaration.declaration_hash();
            if node.last_declaration_hash != Some(declaration_hash) {
                needs_compile = true;
                node.last_declaration_hash = Some(declaration_hash);
            }
            node.declaration = declaration;
            node.pass.setup(&self.registry.view())?;
            node.last_inputs_hash = Some(inputs_hash);
        }
        if needs_compile {
            self.compile(world)?;
        }
        Ok(needs_compile)
    }

    // ===== COMPILATION =====

    /// Compile the pass list into batches, transitions and the loop-back
    /// batch. Compilation errors are programming errors and fatal to the
    /// caller.
    pub fn compile(&mut self, world: &World) -> Result<()> {
        self.resolve_declarations(world)?;

        self.batches.clear();
        let mut current = PassBatch::default();
        let mut final_states: StateMap = StateMap::default();

        for index in 0..self.passes.len() {
            if Self::is_new_batch_needed(&current, &self.passes[index].resolved) {
                self.close_batch(&mut current, &mut final_states);
            }
            current.pass_indices.push(index);
            for (id, range, state) in &self.passes[index].resolved {
                current
                    .resource_states
                    .entry(*id)
                    .or_default()
                    .merge_in(range, *state);
            }
        }
        // Handle the last batch
        self.close_batch(&mut current, &mut final_states);

        // Terminal loop-back batch: return every touched resource to its
        // initial state so the graph can re-execute
        let mut loop_batch = PassBatch::default();
        for (id, ranges) in &final_states {
            let initial = self.registry.get(*id).initial_state();
            for (range, state) in &ranges.pieces {
                if *state != initial {
                    loop_batch.transitions.push(ResourceTransition {
                        resource: *id,
                        range: *range,
                        from: *state,
                        to: initial,
                    });
                }
            }
        }
        self.batches.push(loop_batch);

        // The authoritative tracked state reflects the post-loop-back world
        for id in final_states.keys() {
            let resource = self.registry.get(*id);
            resource.reset_state(resource.initial_state());
        }

        self.compiled = true;
        crate::engine_debug!("nebula3d::RenderGraph",
            "Compiled {} passes into {} batches", self.passes.len(), self.batches.len());
        Ok(())
    }

    fn resolve_declarations(&mut self, world: &World) -> Result<()> {
        for index in 0..self.passes.len() {
            let mut resolved = Vec::new();
            for usage in &self.passes[index].declaration.usages {
                let id = self.registry.lookup(&usage.selector.name)?;
                let range = self.registry.get(id).normalize_range(&usage.selector.range);
                resolved.push((id, range, usage.state));
            }
            for ecs_usage in &self.passes[index].declaration.ecs_usages {
                for resource in (ecs_usage.resolver)(world) {
                    let range = resource.whole_range();
                    let id = self.registry.register_external(resource);
                    resolved.push((id, range, ecs_usage.state));
                }
            }

            // Conflicting simultaneous intents on the same subresource
            // within one pass are a programming error
            for (i, a) in resolved.iter().enumerate() {
                for b in &resolved[i + 1..] {
                    if a.0 == b.0 && a.1.overlaps(&b.1) && a.2.merge(b.2).is_none() {
                        let name = self.registry.get(a.0).name();
                        engine_bail!(UsageConflict, "nebula3d::RenderGraph",
                            "pass '{}' declares '{}' as both {:?} and {:?}",
                            self.passes[index].name, name, a.2, b.2);
                    }
                }
            }
            self.passes[index].resolved = resolved;
        }
        Ok(())
    }

    /// A new batch is needed when any declared usage maps an overlapping
    /// subresource range to a state it cannot merge with
    fn is_new_batch_needed(
        batch: &PassBatch,
        resolved: &[(ResourceId, SubresourceRange, ResourceState)],
    ) -> bool {
        for (id, range, state) in resolved {
            if let Some(ranges) = batch.resource_states.get(id) {
                for (_, existing) in ranges.query(range) {
                    if existing.merge(*state).is_none() {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Compute the closing batch's transitions against the states the
    /// previous batches left behind (`final_states`), falling back to each
    /// resource's tracked state for untouched ranges, then fold the batch's
    /// states into `final_states` and push the batch.
    fn close_batch(&mut self, current: &mut PassBatch, final_states: &mut StateMap) {
        let mut batch = std::mem::take(current);

        for (id, ranges) in &batch.resource_states {
            let resource = self.registry.get(*id);
            for (range, desired) in &ranges.pieces {
                let mut previous: Vec<(SubresourceRange, ResourceState)> = Vec::new();
                match final_states.get(id) {
                    Some(prev) => {
                        previous.extend(prev.query(range));
                        for gap in prev.uncovered(range) {
                            previous.extend(resource.current_states(&gap));
                        }
                    }
                    None => previous.extend(resource.current_states(range)),
                }
                for (prev_range, prev_state) in previous {
                    if prev_state != *desired {
                        batch.transitions.push(ResourceTransition {
                            resource: *id,
                            range: prev_range,
                            from: prev_state,
                            to: *desired,
                        });
                    }
                }
            }
        }

        for (id, ranges) in &batch.resource_states {
            let entry = final_states.entry(*id).or_default();
            for (range, state) in &ranges.pieces {
                entry.set(range, *state);
            }
        }
        self.batches.push(batch);
    }

    // ===== EXECUTION =====

    /// Execute the compiled batches for one frame
    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if !self.compiled {
            engine_bail!(Configuration, "nebula3d::RenderGraph",
                "execute called before compile");
        }
        let slot = ctx.frame.slot;
        if slot >= self.transition_lists.len() {
            engine_bail!(Configuration, "nebula3d::RenderGraph",
                "frame slot {} outside the {} prepared frames",
                slot, self.transition_lists.len());
        }

        for batch_index in 0..self.batches.len() {
            // Record and submit the batch's transitions as one barrier call
            {
                let barriers = self.lower_transitions(&self.batches[batch_index].transitions);
                let list = &mut self.transition_lists[slot];
                list.begin()?;
                if !barriers.is_empty() {
                    list.resource_barrier(&barriers)?;
                }
                list.end()?;
                let mut device = self
                    .device
                    .lock()
                    .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
                device.submit(QueueKind::Graphics, &mut [list.as_mut()], None)?;
            }

            // Execute all passes in the batch, in registration order
            for i in 0..self.batches[batch_index].pass_indices.len() {
                let pass_index = self.batches[batch_index].pass_indices[i];
                let geometry_pass = self.passes[pass_index].declaration.geometry_pass;
                let registry_view = self.registry.view();
                let list = &mut self.pass_lists[slot];
                list.begin()?;
                list.set_descriptor_heaps()?;
                list.bind_layout()?;
                if geometry_pass {
                    let (width, height) = ctx.settings.render_resolution;
                    list.set_viewport(Viewport {
                        x: 0.0,
                        y: 0.0,
                        width: width as f32,
                        height: height as f32,
                        min_depth: 0.0,
                        max_depth: 1.0,
                    })?;
                    list.set_scissor(Rect2D {
                        x: 0,
                        y: 0,
                        width,
                        height,
                    })?;
                }

                let pass_return = {
                    let mut pass_ctx = PassContext {
                        list: list.as_mut(),
                        world: ctx.world,
                        managers: ctx.managers,
                        registry: &registry_view,
                        frame: ctx.frame,
                        settings: &ctx.settings,
                    };
                    self.passes[pass_index].pass.execute(&mut pass_ctx)?
                };
                list.end()?;

                let mut device = self
                    .device
                    .lock()
                    .map_err(|_| Error::BackendError("Device lock poisoned".to_string()))?;
                device.submit(
                    QueueKind::Graphics,
                    &mut [list.as_mut()],
                    pass_return.signal.as_ref().map(|(fence, value)| (fence, *value)),
                )?;
            }
        }
        Ok(())
    }

    /// Release every pass's transient state
    pub fn cleanup(&mut self) {
        for node in &mut self.passes {
            node.pass.cleanup();
        }
    }

    fn lower_transitions(
        &self,
        transitions: &[ResourceTransition<ResourceId>],
    ) -> Vec<BarrierDesc> {
        transitions
            .iter()
            .map(|t| match self.registry.get(t.resource) {
                GraphResource::Buffer(b) => BarrierDesc::Buffer(BufferBarrier {
                    buffer: b.handle().clone(),
                    from: t.from,
                    to: t.to,
                }),
                GraphResource::Texture(tex) => BarrierDesc::Texture(TextureBarrier {
                    texture: tex.handle().clone(),
                    range: t.range,
                    from: t.from,
                    to: t.to,
                }),
                GraphResource::Pool(pool) => BarrierDesc::Buffer(BufferBarrier {
                    buffer: pool.buffer().handle().clone(),
                    from: t.from,
                    to: t.to,
                }),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
