/// Cluster-LOD hierarchy construction
///
/// Builds the group/child tables and the breadth-first packed traversal
/// node array consumed by the GPU cluster-selection pass. Meshlets are
/// spatially ordered (morton keys, radix sort) before grouping so groups
/// and traversal nodes stay spatially coherent.

use rdst::{RadixKey, RadixSort};

use crate::shader_buffers::{
    BoundingSphere, ClusterLodChild, ClusterLodGroup, ClusterLodNode, ClusterLodNodeRange,
    ClusterLodTraversalMetric, Meshlet,
};
use super::meshlet::MeshletBuild;

/// Meshlets per leaf group
const GROUP_MESHLET_COUNT: usize = 8;
/// Default fan-out of inner traversal nodes
pub const DEFAULT_NODE_WIDTH: usize = 8;

/// Cluster-LOD hierarchy attached to a mesh
#[derive(Debug, Clone, Default)]
pub struct ClusterLodHierarchy {
    pub groups: Vec<ClusterLodGroup>,
    pub children: Vec<ClusterLodChild>,
    /// Spatially reordered copy of the mesh's meshlets
    pub meshlets: Vec<Meshlet>,
    pub meshlet_vertices: Vec<u32>,
    pub meshlet_triangles: Vec<u8>,
    pub meshlet_bounds: Vec<BoundingSphere>,
    /// Group-local meshlet remap referenced by the children table
    pub child_local_meshlet_indices: Vec<u32>,
    /// Breadth-first packed traversal nodes; the root is node index 0
    pub nodes: Vec<ClusterLodNode>,
    pub max_depth: u32,
}

impl ClusterLodHierarchy {
    /// Build the hierarchy from a meshlet build
    pub fn build(meshlet_build: &MeshletBuild, preferred_node_width: usize) -> Self {
        if meshlet_build.meshlets.is_empty() {
            return Self::default();
        }
        let width = preferred_node_width.max(2);

        // Spatially order meshlets so contiguous group ranges are coherent
        let order = spatial_order(&meshlet_build.bounds);
        let meshlets: Vec<Meshlet> = order
            .iter()
            .map(|&i| meshlet_build.meshlets[i as usize])
            .collect();
        let meshlet_bounds: Vec<BoundingSphere> = order
            .iter()
            .map(|&i| meshlet_build.bounds[i as usize])
            .collect();

        // Leaf groups over contiguous meshlet ranges
        let mut groups = Vec::new();
        let mut children = Vec::new();
        let mut child_local = Vec::new();
        for (group_index, range) in meshlets.chunks(GROUP_MESHLET_COUNT).enumerate() {
            let first_meshlet = (group_index * GROUP_MESHLET_COUNT) as u32;
            let count = range.len() as u32;
            let bounds = &meshlet_bounds[first_meshlet as usize..(first_meshlet + count) as usize];
            let sphere = merge_spheres(bounds);
            // Geometric error proxy: the largest meshlet radius in the group
            let error = bounds.iter().map(|b| b.radius).fold(0.0f32, f32::max);

            let child_offset = children.len() as u32;
            children.push(ClusterLodChild {
                group_index: group_index as u32,
                first_local_meshlet: child_local.len() as u32,
                meshlet_count: count,
                _pad: 0,
            });
            child_local.extend(0..count);

            groups.push(ClusterLodGroup {
                first_meshlet,
                meshlet_count: count,
                child_offset,
                child_count: 1,
                bounding_sphere: sphere,
                max_quadric_error: error,
                _pad: [0; 3],
            });
        }

        let (nodes, max_depth) = build_traversal_nodes(&groups, width);

        Self {
            groups,
            children,
            meshlets,
            meshlet_vertices: meshlet_build.meshlet_vertices.clone(),
            meshlet_triangles: meshlet_build.meshlet_triangles.clone(),
            meshlet_bounds,
            child_local_meshlet_indices: child_local,
            nodes,
            max_depth,
        }
    }

    /// Root node index (always 0 in the breadth-first packing)
    pub fn root_node_index(&self) -> u32 {
        0
    }
}

/// An intermediate node during bottom-up construction
struct BuildNode {
    metric: ClusterLodTraversalMetric,
    /// GROUP payload: (group index, meshlet count)
    group: Option<(u32, u32)>,
    /// INNER payload: number of children (a contiguous chunk of the level
    /// below, in order)
    child_count: u32,
}

/// Build the traversal levels bottom-up, then pack breadth-first with the
/// root at node index 0.
///
/// Leaves were already spatially ordered with the groups they cover, so
/// sequential chunking of each level keeps parents spatially coherent while
/// guaranteeing every parent's children form a contiguous range of the next
/// level.
fn build_traversal_nodes(groups: &[ClusterLodGroup], width: usize) -> (Vec<ClusterLodNode>, u32) {
    // Deepest level: one GROUP node per cluster-LOD group
    let mut levels: Vec<Vec<BuildNode>> = Vec::new();
    let leaf_level: Vec<BuildNode> = groups
        .iter()
        .enumerate()
        .map(|(i, group)| BuildNode {
            metric: metric_from(group.bounding_sphere, group.max_quadric_error),
            group: Some((i as u32, group.meshlet_count)),
            child_count: 0,
        })
        .collect();
    levels.push(leaf_level);

    // Chunk each level into parents until a single root remains
    while levels.last().map(|l| l.len() > 1).unwrap_or(false) {
        let child_level = levels.last().expect("level exists");
        let mut parents = Vec::with_capacity(child_level.len().div_ceil(width));
        for chunk in child_level.chunks(width) {
            let bounds: Vec<BoundingSphere> = chunk
                .iter()
                .map(|node| BoundingSphere {
                    center: [
                        node.metric.bounding_sphere_x,
                        node.metric.bounding_sphere_y,
                        node.metric.bounding_sphere_z,
                    ],
                    radius: node.metric.bounding_sphere_radius,
                })
                .collect();
            let sphere = merge_spheres(&bounds);
            let error = chunk
                .iter()
                .map(|node| node.metric.max_quadric_error)
                .fold(0.0f32, f32::max);
            parents.push(BuildNode {
                metric: metric_from(sphere, error),
                group: None,
                child_count: chunk.len() as u32,
            });
        }
        levels.push(parents);
    }

    // Pack breadth-first: root level last in `levels`, first in the output.
    // An INNER node's children occupy a contiguous range of the next level.
    levels.reverse();
    let max_depth = levels.len() as u32;
    let mut level_base = Vec::with_capacity(levels.len() + 1);
    let mut base = 0u32;
    for level in &levels {
        level_base.push(base);
        base += level.len() as u32;
    }
    level_base.push(base);

    let mut nodes = Vec::with_capacity(base as usize);
    for (depth, level) in levels.iter().enumerate() {
        let mut next_child_offset = level_base.get(depth + 1).copied().unwrap_or(base);
        for node in level {
            let range = match node.group {
                Some((group_index, meshlet_count)) => ClusterLodNodeRange {
                    is_group: 1,
                    index_or_offset: group_index,
                    count_minus_one: meshlet_count.saturating_sub(1),
                    _pad: 0,
                },
                None => {
                    let offset = next_child_offset;
                    next_child_offset += node.child_count;
                    ClusterLodNodeRange {
                        is_group: 0,
                        index_or_offset: offset,
                        count_minus_one: node.child_count.saturating_sub(1),
                        _pad: 0,
                    }
                }
            };
            nodes.push(ClusterLodNode {
                range,
                traversal_metric: node.metric,
            });
        }
    }

    (nodes, max_depth)
}

fn metric_from(sphere: BoundingSphere, error: f32) -> ClusterLodTraversalMetric {
    ClusterLodTraversalMetric {
        bounding_sphere_x: sphere.center[0],
        bounding_sphere_y: sphere.center[1],
        bounding_sphere_z: sphere.center[2],
        bounding_sphere_radius: sphere.radius,
        max_quadric_error: error,
        _pad: [0.0; 3],
    }
}

/// Enclosing sphere: centroid of centers, radius covering every child sphere
fn merge_spheres(spheres: &[BoundingSphere]) -> BoundingSphere {
    if spheres.is_empty() {
        return BoundingSphere::default();
    }
    let mut center = [0.0f32; 3];
    for s in spheres {
        center[0] += s.center[0];
        center[1] += s.center[1];
        center[2] += s.center[2];
    }
    let inv = 1.0 / spheres.len() as f32;
    center[0] *= inv;
    center[1] *= inv;
    center[2] *= inv;
    let mut radius = 0.0f32;
    for s in spheres {
        let d = ((s.center[0] - center[0]).powi(2)
            + (s.center[1] - center[1]).powi(2)
            + (s.center[2] - center[2]).powi(2))
        .sqrt();
        radius = radius.max(d + s.radius);
    }
    BoundingSphere { center, radius }
}

// ===== SPATIAL ORDERING =====

#[derive(Clone, Copy, Debug)]
struct SpatialEntry {
    key: u64,
    index: u32,
}

impl RadixKey for SpatialEntry {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// Indices of `bounds` in morton order of their centers
fn spatial_order(bounds: &[BoundingSphere]) -> Vec<u32> {
    if bounds.is_empty() {
        return Vec::new();
    }
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for b in bounds {
        for axis in 0..3 {
            min[axis] = min[axis].min(b.center[axis]);
            max[axis] = max[axis].max(b.center[axis]);
        }
    }
    let extent = [
        (max[0] - min[0]).max(f32::EPSILON),
        (max[1] - min[1]).max(f32::EPSILON),
        (max[2] - min[2]).max(f32::EPSILON),
    ];

    let mut entries: Vec<SpatialEntry> = bounds
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let q = |axis: usize| {
                let t = (b.center[axis] - min[axis]) / extent[axis];
                (t * 1023.0) as u64
            };
            SpatialEntry {
                key: morton3(q(0), q(1), q(2)),
                index: i as u32,
            }
        })
        .collect();
    entries.radix_sort_unstable();
    entries.into_iter().map(|e| e.index).collect()
}

/// Interleave three 10-bit coordinates into a 30-bit morton key
fn morton3(x: u64, y: u64, z: u64) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

fn spread_bits(mut v: u64) -> u64 {
    v &= 0x3ff;
    v = (v | (v << 16)) & 0x30000ff;
    v = (v | (v << 8)) & 0x300f00f;
    v = (v | (v << 4)) & 0x30c30c3;
    v = (v | (v << 2)) & 0x9249249;
    v
}

#[cfg(test)]
#[path = "cluster_lod_tests.rs"]
mod tests;
