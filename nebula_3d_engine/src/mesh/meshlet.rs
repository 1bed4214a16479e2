/// Meshlet construction
///
/// Greedy scan-order clustering of the index buffer into meshlets under the
/// mesh-shader work-group budget, plus the meshlet-reordered vertex blob the
/// mesh-shader path uses to index vertices by local meshlet slot.

use rustc_hash::FxHashMap;

use crate::shader_buffers::{BoundingSphere, Meshlet};

/// Vertex budget per meshlet (one mesh-shader work group)
pub const MAX_MESHLET_VERTICES: u32 = 64;
/// Triangle budget per meshlet
pub const MAX_MESHLET_TRIANGLES: u32 = 124;

/// Output of meshlet construction over one index buffer
#[derive(Debug, Clone, Default)]
pub struct MeshletBuild {
    pub meshlets: Vec<Meshlet>,
    /// Global vertex index per meshlet-local slot
    pub meshlet_vertices: Vec<u32>,
    /// Meshlet-local vertex indices, 3 per triangle
    pub meshlet_triangles: Vec<u8>,
    pub bounds: Vec<BoundingSphere>,
}

/// Cluster `indices` into meshlets in scan order.
///
/// A meshlet closes when adding the next triangle would exceed either
/// budget. Bounds are computed from `positions` (3 floats per vertex).
pub fn build_meshlets(indices: &[u32], positions: &[f32]) -> MeshletBuild {
    let mut build = MeshletBuild::default();
    if indices.is_empty() {
        return build;
    }

    let mut local_indices: FxHashMap<u32, u8> = FxHashMap::default();
    let mut current = Meshlet {
        vertex_offset: 0,
        triangle_offset: 0,
        vertex_count: 0,
        triangle_count: 0,
    };

    let flush = |build: &mut MeshletBuild,
                 current: &mut Meshlet,
                 local_indices: &mut FxHashMap<u32, u8>,
                 positions: &[f32]| {
        if current.triangle_count == 0 {
            return;
        }
        let first = current.vertex_offset as usize;
        let count = current.vertex_count as usize;
        build.bounds.push(bounding_sphere_of(
            &build.meshlet_vertices[first..first + count],
            positions,
        ));
        build.meshlets.push(*current);
        *current = Meshlet {
            vertex_offset: build.meshlet_vertices.len() as u32,
            triangle_offset: build.meshlet_triangles.len() as u32,
            vertex_count: 0,
            triangle_count: 0,
        };
        local_indices.clear();
    };

    for triangle in indices.chunks_exact(3) {
        let new_vertices = triangle
            .iter()
            .filter(|&&v| !local_indices.contains_key(&v))
            .count() as u32;
        if current.vertex_count + new_vertices > MAX_MESHLET_VERTICES
            || current.triangle_count + 1 > MAX_MESHLET_TRIANGLES
        {
            flush(&mut build, &mut current, &mut local_indices, positions);
        }
        for &vertex in triangle {
            let local = *local_indices.entry(vertex).or_insert_with(|| {
                let local = current.vertex_count as u8;
                current.vertex_count += 1;
                build.meshlet_vertices.push(vertex);
                local
            });
            build.meshlet_triangles.push(local);
        }
        current.triangle_count += 1;
    }
    flush(&mut build, &mut current, &mut local_indices, positions);
    build
}

/// Bounding sphere of a vertex subset: centroid center, max-distance radius
pub fn bounding_sphere_of(vertex_indices: &[u32], positions: &[f32]) -> BoundingSphere {
    if vertex_indices.is_empty() {
        return BoundingSphere::default();
    }
    let mut center = [0.0f32; 3];
    for &v in vertex_indices {
        let p = &positions[v as usize * 3..v as usize * 3 + 3];
        center[0] += p[0];
        center[1] += p[1];
        center[2] += p[2];
    }
    let inv = 1.0 / vertex_indices.len() as f32;
    center[0] *= inv;
    center[1] *= inv;
    center[2] *= inv;

    let mut radius_sq = 0.0f32;
    for &v in vertex_indices {
        let p = &positions[v as usize * 3..v as usize * 3 + 3];
        let d = (p[0] - center[0]).powi(2) + (p[1] - center[1]).powi(2)
            + (p[2] - center[2]).powi(2);
        radius_sq = radius_sq.max(d);
    }
    BoundingSphere {
        center,
        radius: radius_sq.sqrt(),
    }
}

/// Duplicate vertices into meshlet order so the mesh shader can address a
/// vertex as `meshlet.vertex_offset + local_slot` without the remap read.
pub fn build_meshlet_reordered_vertices(
    meshlet_vertices: &[u32],
    vertex_blob: &[u8],
    stride: usize,
) -> Vec<u8> {
    let mut reordered = Vec::with_capacity(meshlet_vertices.len() * stride);
    for &vertex in meshlet_vertices {
        let start = vertex as usize * stride;
        reordered.extend_from_slice(&vertex_blob[start..start + stride]);
    }
    reordered
}

#[cfg(test)]
#[path = "meshlet_tests.rs"]
mod tests;
