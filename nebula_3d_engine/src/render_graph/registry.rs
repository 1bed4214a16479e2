/// Resource registry
///
/// Named resources the graph may transition and passes may resolve. Every
/// resource registers exactly once; duplicate names and unknown lookups are
/// programming errors surfaced as typed error values.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::resources::dynamic_buffer::ViewedBuffer;
use crate::resources::{GpuBuffer, PixelBuffer};
use crate::rhi::{ResourceState, SubresourceRange};

/// Index of a registered resource within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// A resource the graph tracks state for
#[derive(Clone)]
pub enum GraphResource {
    Buffer(Arc<GpuBuffer>),
    Texture(Arc<PixelBuffer>),
    /// A dynamic pool's backing buffer, resolved through the pool's
    /// indirection object so growth does not leave the graph pointing at a
    /// retired buffer
    Pool(Arc<ViewedBuffer>),
}

impl GraphResource {
    /// Full subresource range (buffers are a single subresource)
    pub fn whole_range(&self) -> SubresourceRange {
        match self {
            GraphResource::Buffer(_) | GraphResource::Pool(_) => SubresourceRange::single(0, 0),
            GraphResource::Texture(t) => t.whole_range(),
        }
    }

    /// Clamp a declared range against the resource's real extents
    pub fn normalize_range(&self, range: &SubresourceRange) -> SubresourceRange {
        match self {
            GraphResource::Buffer(_) | GraphResource::Pool(_) => SubresourceRange::single(0, 0),
            GraphResource::Texture(t) => range.normalized(t.mip_levels(), t.array_layers()),
        }
    }

    /// State the resource was created in
    pub fn initial_state(&self) -> ResourceState {
        match self {
            GraphResource::Buffer(b) => b.state().initial_state(),
            GraphResource::Texture(t) => t.state().initial_state(),
            GraphResource::Pool(p) => p.buffer().state().initial_state(),
        }
    }

    /// Current tracked states intersecting `range`
    pub fn current_states(
        &self,
        range: &SubresourceRange,
    ) -> Vec<(SubresourceRange, ResourceState)> {
        match self {
            GraphResource::Buffer(b) => b.state().query(range),
            GraphResource::Texture(t) => t.state().query(range),
            GraphResource::Pool(p) => p.buffer().state().query(range),
        }
    }

    /// Reset the tracked state of the whole resource
    pub fn reset_state(&self, state: ResourceState) {
        match self {
            GraphResource::Buffer(b) => b.state().reset(state),
            GraphResource::Texture(t) => t.state().reset(state),
            GraphResource::Pool(p) => p.buffer().state().reset(state),
        }
    }

    pub fn name(&self) -> String {
        match self {
            GraphResource::Buffer(b) => b.name().to_string(),
            GraphResource::Texture(t) => t.name().to_string(),
            GraphResource::Pool(p) => p.buffer().name().to_string(),
        }
    }
}

pub struct ResourceRegistry {
    resources: Vec<GraphResource>,
    by_name: FxHashMap<String, ResourceId>,
    /// Anonymous resources discovered at build time (indirect-argument
    /// buffers), keyed by buffer identity
    external: FxHashMap<usize, ResourceId>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            by_name: FxHashMap::default(),
            external: FxHashMap::default(),
        }
    }

    /// Register a named texture.
    ///
    /// # Errors
    ///
    /// `DuplicateResource` when the name is taken.
    pub fn register_texture(&mut self, name: &str, texture: Arc<PixelBuffer>) -> Result<ResourceId> {
        self.register(name, GraphResource::Texture(texture))
    }

    /// Register a named buffer
    pub fn register_buffer(&mut self, name: &str, buffer: Arc<GpuBuffer>) -> Result<ResourceId> {
        self.register(name, GraphResource::Buffer(buffer))
    }

    /// Register a named dynamic pool (survives pool growth)
    pub fn register_pool(&mut self, name: &str, pool: Arc<ViewedBuffer>) -> Result<ResourceId> {
        self.register(name, GraphResource::Pool(pool))
    }

    fn register(&mut self, name: &str, resource: GraphResource) -> Result<ResourceId> {
        if name.is_empty() {
            engine_bail!(InvalidResource, "nebula3d::RenderGraph",
                "resource name cannot be empty");
        }
        if self.by_name.contains_key(name) {
            engine_bail!(DuplicateResource, "nebula3d::RenderGraph",
                "resource '{}' already exists", name);
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(resource);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register (or find) an anonymous resource discovered at build time
    /// (indirect-argument buffers, per-light shadow maps)
    pub fn register_external(&mut self, resource: GraphResource) -> ResourceId {
        let key = match &resource {
            GraphResource::Buffer(b) => Arc::as_ptr(b) as *const () as usize,
            GraphResource::Texture(t) => Arc::as_ptr(t) as *const () as usize,
            GraphResource::Pool(p) => Arc::as_ptr(p) as *const () as usize,
        };
        if let Some(&id) = self.external.get(&key) {
            return id;
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(resource);
        self.external.insert(key, id);
        id
    }

    /// Resolve a name to its id.
    ///
    /// # Errors
    ///
    /// `MissingResource` when the name was never registered.
    pub fn lookup(&self, name: &str) -> Result<ResourceId> {
        self.by_name.get(name).copied().ok_or_else(|| {
            crate::engine_err!(MissingResource, "nebula3d::RenderGraph",
                "resource not found: {}", name)
        })
    }

    pub fn get(&self, id: ResourceId) -> &GraphResource {
        &self.resources[id.0 as usize]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Read-only view handed to passes during setup and execution
    pub fn view(&self) -> ResourceRegistryView<'_> {
        ResourceRegistryView { registry: self }
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only resolution interface for passes
pub struct ResourceRegistryView<'a> {
    registry: &'a ResourceRegistry,
}

impl ResourceRegistryView<'_> {
    /// Resolve a registered texture by name
    pub fn texture(&self, name: &str) -> Result<Arc<PixelBuffer>> {
        let id = self.registry.lookup(name)?;
        match self.registry.get(id) {
            GraphResource::Texture(t) => Ok(t.clone()),
            _ => Err(Error::InvalidResource(format!(
                "resource '{}' is a buffer, not a texture",
                name
            ))),
        }
    }

    /// Resolve a registered buffer by name (pools resolve to their current
    /// backing buffer)
    pub fn buffer(&self, name: &str) -> Result<Arc<GpuBuffer>> {
        let id = self.registry.lookup(name)?;
        match self.registry.get(id) {
            GraphResource::Buffer(b) => Ok(b.clone()),
            GraphResource::Pool(p) => Ok(p.buffer()),
            GraphResource::Texture(_) => Err(Error::InvalidResource(format!(
                "resource '{}' is a texture, not a buffer",
                name
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }
}
