/// Render graph
///
/// A declarative pass graph: passes register their resource usage through a
/// builder DSL, compilation folds consecutive passes into batches that need
/// no intra-batch transitions, computes the barrier set between batches and
/// a terminal loop-back batch, and execution submits one transition batch
/// plus the passes' command lists per batch on the primary queue.

pub mod registry;
pub mod builder;
pub mod pass;
pub mod graph;

pub use registry::{GraphResource, ResourceId, ResourceRegistry, ResourceRegistryView};
pub use builder::{
    subresources, DeclaredUsage, EcsResourceResolver, EcsUsage, PassBuilder, PassResourceUsage,
    ResourceSelector,
};
pub use pass::{ExecutionContext, PassContext, PassReturn, RenderPass};
pub use graph::{PassBatch, RenderGraph};
