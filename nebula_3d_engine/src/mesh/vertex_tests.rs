use super::*;

fn quad_data(flags: VertexFlags) -> MeshData {
    MeshData {
        positions: vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ],
        normals: vec![0.0, 0.0, 1.0].repeat(4),
        texcoords: Some(vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
        indices: vec![0, 1, 2, 0, 2, 3],
        flags,
        ..Default::default()
    }
}

#[test]
fn test_stride_follows_attribute_set() {
    let data = quad_data(VertexFlags::HAS_NORMALS | VertexFlags::HAS_TEXCOORDS);
    assert_eq!(data.vertex_stride(), 12 + 12 + 8);

    let bare = quad_data(VertexFlags::empty());
    assert_eq!(bare.vertex_stride(), 12);
}

#[test]
fn test_vertex_blob_interleaves_attributes() {
    let data = quad_data(VertexFlags::HAS_NORMALS | VertexFlags::HAS_TEXCOORDS);
    let blob = data.build_vertex_blob();
    assert_eq!(blob.len(), 4 * 32);

    // Second vertex starts with its position
    let floats: &[f32] = bytemuck::cast_slice(&blob[32..44]);
    assert_eq!(floats, &[1.0, 0.0, 0.0]);
}

#[test]
fn test_validate_rejects_out_of_range_indices() {
    let mut data = quad_data(VertexFlags::HAS_NORMALS | VertexFlags::HAS_TEXCOORDS);
    data.indices.push(99);
    assert!(data.validate().is_err());
}

#[test]
fn test_validate_rejects_skinned_without_weights() {
    let mut data = quad_data(VertexFlags::HAS_NORMALS | VertexFlags::HAS_TEXCOORDS);
    data.flags |= VertexFlags::SKINNED;
    assert!(data.validate().is_err());

    data.joints = Some(vec![0u16; 16]);
    data.weights = Some(vec![0.25f32; 16]);
    assert!(data.validate().is_ok());
    assert_eq!(data.build_skinning_blob().unwrap().len(), 4 * 24);
}
