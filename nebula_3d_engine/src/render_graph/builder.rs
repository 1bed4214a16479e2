/// Pass builder DSL
///
/// Each pass declares its resource usage through this builder:
/// `with_shader_resource`, `with_render_target`, `with_depth_read_write`,
/// `with_unordered_access`, copy intents, and `with_indirect_arguments`
/// (an ECS-resolved resource set). Declarations may address subresource
/// ranges via [`subresources`].

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::ecs::World;
use crate::rhi::{ResourceState, SubresourceRange};
use super::registry::GraphResource;

/// Resolver that produces a resource set from an ECS query at build time
/// (opaque to the graph until compilation)
pub type EcsResourceResolver = Box<dyn Fn(&World) -> Vec<GraphResource> + Send + Sync>;

/// An ECS-resolved usage: every resource the resolver returns is declared
/// in `state`
pub struct EcsUsage {
    pub state: ResourceState,
    pub resolver: EcsResourceResolver,
}

/// A named resource, optionally restricted to a subresource range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSelector {
    pub name: String,
    pub range: SubresourceRange,
}

impl From<&str> for ResourceSelector {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            range: SubresourceRange::ALL,
        }
    }
}

impl From<String> for ResourceSelector {
    fn from(name: String) -> Self {
        Self {
            name,
            range: SubresourceRange::ALL,
        }
    }
}

/// Select a mip range of a resource: `subresources("HDR", 1, 1)` is mip 1
pub fn subresources(name: impl Into<String>, first_mip: u32, mip_count: u32) -> ResourceSelector {
    ResourceSelector {
        name: name.into(),
        range: SubresourceRange::mips(first_mip, mip_count),
    }
}

/// One declared usage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredUsage {
    pub selector: ResourceSelector,
    pub state: ResourceState,
}

/// The full declaration of one pass
#[derive(Default)]
pub struct PassResourceUsage {
    pub usages: Vec<DeclaredUsage>,
    pub ecs_usages: Vec<EcsUsage>,
    pub geometry_pass: bool,
}

impl PassResourceUsage {
    /// Hash over the static declaration (resolver output is build-time
    /// state and intentionally excluded)
    pub fn declaration_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for usage in &self.usages {
            usage.hash(&mut hasher);
        }
        for ecs_usage in &self.ecs_usages {
            ecs_usage.state.hash(&mut hasher);
        }
        self.geometry_pass.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builder a pass declares its usage into
#[derive(Default)]
pub struct PassBuilder {
    usage: PassResourceUsage,
}

impl PassBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource(s) read as SRV from any shader stage
    pub fn with_shader_resource(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::AllSrv)
    }

    /// Resource read as SRV from non-pixel stages only
    pub fn with_non_pixel_shader_resource(
        &mut self,
        selector: impl Into<ResourceSelector>,
    ) -> &mut Self {
        self.push(selector.into(), ResourceState::NonPixelSrv)
    }

    /// Resource read as SRV from the pixel stage only
    pub fn with_pixel_shader_resource(
        &mut self,
        selector: impl Into<ResourceSelector>,
    ) -> &mut Self {
        self.push(selector.into(), ResourceState::PixelSrv)
    }

    /// Resource written as a render target
    pub fn with_render_target(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::RenderTarget)
    }

    /// Depth-stencil written by this pass
    pub fn with_depth_read_write(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::DepthWrite)
    }

    /// Depth-stencil tested but not written
    pub fn with_depth_read(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::DepthRead)
    }

    /// Resource accessed through a UAV
    pub fn with_unordered_access(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::UnorderedAccess)
    }

    /// Resource bound as a constant buffer
    pub fn with_constant_buffer(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::Constant)
    }

    pub fn with_copy_source(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::CopySource)
    }

    pub fn with_copy_dest(&mut self, selector: impl Into<ResourceSelector>) -> &mut Self {
        self.push(selector.into(), ResourceState::CopyDest)
    }

    /// A resource set derived from an ECS query at build time; everything
    /// the resolver returns is used as an indirect-argument buffer
    pub fn with_indirect_arguments(&mut self, resolver: EcsResourceResolver) -> &mut Self {
        self.usage.ecs_usages.push(EcsUsage {
            state: ResourceState::IndirectArgument,
            resolver,
        });
        self
    }

    /// A resource set derived from an ECS query at build time, declared in
    /// an arbitrary state (per-light shadow maps and similar)
    pub fn with_ecs_resources(
        &mut self,
        state: ResourceState,
        resolver: EcsResourceResolver,
    ) -> &mut Self {
        self.usage.ecs_usages.push(EcsUsage { state, resolver });
        self
    }

    /// Mark as a geometry pass: the graph applies the frame's viewport and
    /// scissor before execution
    pub fn is_geometry_pass(&mut self) -> &mut Self {
        self.usage.geometry_pass = true;
        self
    }

    pub fn finish(self) -> PassResourceUsage {
        self.usage
    }

    fn push(&mut self, selector: ResourceSelector, state: ResourceState) -> &mut Self {
        self.usage.usages.push(DeclaredUsage { selector, state });
        self
    }
}
