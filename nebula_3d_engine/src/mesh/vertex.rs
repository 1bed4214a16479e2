/// Vertex flags and the asset-loader mesh contract

use bitflags::bitflags;

use crate::engine_bail;
use crate::error::Result;

bitflags! {
    /// Which attributes a mesh's vertices carry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VertexFlags: u32 {
        const HAS_NORMALS   = 1 << 0;
        const HAS_TEXCOORDS = 1 << 1;
        const HAS_COLORS    = 1 << 2;
        const SKINNED       = 1 << 3;
    }
}

/// Mesh payload produced by external asset loaders (glTF/Assimp/USD).
///
/// Attribute arrays are flat: positions/normals are `3N` floats, texcoords
/// `2N`, colors `4N`, joints/weights `4N`.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub texcoords: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub joints: Option<Vec<u16>>,
    pub weights: Option<Vec<f32>>,
    pub indices: Vec<u32>,
    pub flags: VertexFlags,
    /// Skeleton table index assigned by the loader, for skinned meshes
    pub skin_index: Option<usize>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Validate attribute array lengths against the vertex count.
    ///
    /// Import mismatches are signaled to the caller; the entity is simply
    /// not activated.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertex_count();
        if self.positions.len() != n * 3 {
            engine_bail!(InvalidResource, "nebula3d::MeshData",
                "positions length {} is not a multiple of 3", self.positions.len());
        }
        if self.flags.contains(VertexFlags::HAS_NORMALS) && self.normals.len() != n * 3 {
            engine_bail!(InvalidResource, "nebula3d::MeshData",
                "normals length {} does not match {} vertices", self.normals.len(), n);
        }
        if self.flags.contains(VertexFlags::HAS_TEXCOORDS) {
            match &self.texcoords {
                Some(tc) if tc.len() == n * 2 => {}
                _ => engine_bail!(InvalidResource, "nebula3d::MeshData",
                    "texcoords missing or wrong length for {} vertices", n),
            }
        }
        if self.flags.contains(VertexFlags::HAS_COLORS) {
            match &self.colors {
                Some(c) if c.len() == n * 4 => {}
                _ => engine_bail!(InvalidResource, "nebula3d::MeshData",
                    "colors missing or wrong length for {} vertices", n),
            }
        }
        if self.flags.contains(VertexFlags::SKINNED) {
            match (&self.joints, &self.weights) {
                (Some(j), Some(w)) if j.len() == n * 4 && w.len() == n * 4 => {}
                _ => engine_bail!(InvalidResource, "nebula3d::MeshData",
                    "joints/weights missing or wrong length for {} vertices", n),
            }
        }
        for &index in &self.indices {
            if index as usize >= n {
                engine_bail!(InvalidResource, "nebula3d::MeshData",
                    "index {} out of range ({} vertices)", index, n);
            }
        }
        Ok(())
    }

    /// Render-vertex stride in bytes for this attribute set
    pub fn vertex_stride(&self) -> u32 {
        let mut stride = 12; // position
        if self.flags.contains(VertexFlags::HAS_NORMALS) {
            stride += 12;
        }
        if self.flags.contains(VertexFlags::HAS_TEXCOORDS) {
            stride += 8;
        }
        if self.flags.contains(VertexFlags::HAS_COLORS) {
            stride += 16;
        }
        stride
    }

    /// Skinning-vertex stride: 4 u16 joints + 4 f32 weights
    pub fn skinning_vertex_stride(&self) -> u32 {
        24
    }

    /// Interleave the render-vertex blob (position, normal, texcoord, color)
    pub fn build_vertex_blob(&self) -> Vec<u8> {
        let n = self.vertex_count();
        let stride = self.vertex_stride() as usize;
        let mut blob = Vec::with_capacity(n * stride);
        for i in 0..n {
            blob.extend_from_slice(bytemuck::cast_slice(&self.positions[i * 3..i * 3 + 3]));
            if self.flags.contains(VertexFlags::HAS_NORMALS) {
                blob.extend_from_slice(bytemuck::cast_slice(&self.normals[i * 3..i * 3 + 3]));
            }
            if self.flags.contains(VertexFlags::HAS_TEXCOORDS) {
                if let Some(tc) = &self.texcoords {
                    blob.extend_from_slice(bytemuck::cast_slice(&tc[i * 2..i * 2 + 2]));
                }
            }
            if self.flags.contains(VertexFlags::HAS_COLORS) {
                if let Some(c) = &self.colors {
                    blob.extend_from_slice(bytemuck::cast_slice(&c[i * 4..i * 4 + 4]));
                }
            }
        }
        blob
    }

    /// Interleave the skinning blob (joints, weights), if skinned
    pub fn build_skinning_blob(&self) -> Option<Vec<u8>> {
        if !self.flags.contains(VertexFlags::SKINNED) {
            return None;
        }
        let (joints, weights) = (self.joints.as_ref()?, self.weights.as_ref()?);
        let n = self.vertex_count();
        let mut blob = Vec::with_capacity(n * self.skinning_vertex_stride() as usize);
        for i in 0..n {
            blob.extend_from_slice(bytemuck::cast_slice(&joints[i * 4..i * 4 + 4]));
            blob.extend_from_slice(bytemuck::cast_slice(&weights[i * 4..i * 4 + 4]));
        }
        Some(blob)
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
