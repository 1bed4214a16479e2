/// Render pass contract
///
/// Every concrete pass follows the same four-step contract:
/// 1. `declare_resource_usages` - idempotent, depends only on the pass's
///    inputs and the ECS schema
/// 2. `setup` - resolve resource pointers and SRV indices from the registry
/// 3. `execute` - record commands using resolved pointers; never creates
///    resources
/// 4. `cleanup` - release pass-local transient state

use std::sync::Arc;

use crate::ecs::World;
use crate::error::Result;
use crate::managers::Managers;
use crate::resources::FrameTick;
use crate::rhi::{CommandList, FenceHandle};
use crate::settings::RenderSettings;
use super::builder::PassBuilder;
use super::registry::ResourceRegistryView;

/// Result of one pass execution. A pass may hand back a fence/value pair
/// the graph signals after submitting the pass's commands.
#[derive(Default)]
pub struct PassReturn {
    pub signal: Option<(Arc<dyn FenceHandle>, u64)>,
}

/// Everything a pass may touch while recording
pub struct PassContext<'a> {
    pub list: &'a mut dyn CommandList,
    pub world: &'a World,
    pub managers: &'a Managers,
    pub registry: &'a ResourceRegistryView<'a>,
    pub frame: FrameTick,
    pub settings: &'a RenderSettings,
}

/// Per-frame inputs to `RenderGraph::execute`
pub struct ExecutionContext<'a> {
    pub world: &'a World,
    pub managers: &'a Managers,
    pub frame: FrameTick,
    pub settings: RenderSettings,
}

pub trait RenderPass: Send {
    fn name(&self) -> &str;

    /// Declare every resource this pass touches
    fn declare_resource_usages(&self, builder: &mut PassBuilder) -> Result<()>;

    /// Resolve resource pointers and SRV indices for later push-constant
    /// binding. Re-run when the pass's inputs or declaration change.
    fn setup(&mut self, registry: &ResourceRegistryView<'_>) -> Result<()> {
        let _ = registry;
        Ok(())
    }

    /// Record this pass's commands
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<PassReturn>;

    /// Release pass-local transient state
    fn cleanup(&mut self) {}

    /// Hash of the pass's strongly-typed inputs. The graph skips
    /// `declare_resource_usages` + `setup` while this and the declaration
    /// hash are unchanged.
    fn inputs_hash(&self) -> u64 {
        0
    }
}
