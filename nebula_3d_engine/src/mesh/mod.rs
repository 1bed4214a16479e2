/// Mesh data model
///
/// Meshlet-based mesh representation with an optional cluster-LOD hierarchy,
/// plus the mesh-instance indirection (one mesh, many instances; skinned
/// instances own unique post-skinning storage).

pub mod vertex;
pub mod meshlet;
pub mod cluster_lod;
pub mod skeleton;
pub mod mesh;
pub mod mesh_instance;

pub use vertex::{MeshData, VertexFlags};
pub use meshlet::{MeshletBuild, MAX_MESHLET_TRIANGLES, MAX_MESHLET_VERTICES};
pub use cluster_lod::ClusterLodHierarchy;
pub use skeleton::{AnimationClip, Skeleton};
pub use mesh::{Aabb, Mesh};
pub use mesh_instance::MeshInstance;
