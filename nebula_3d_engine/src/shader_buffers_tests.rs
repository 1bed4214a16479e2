use super::*;

// GPU-facing layouts must stay 16-byte aligned and match the offsets the
// shaders compute

#[test]
fn test_struct_sizes_are_16_byte_multiples() {
    assert_eq!(std::mem::size_of::<BoundingSphere>(), 16);
    assert_eq!(std::mem::size_of::<Meshlet>(), 16);
    assert_eq!(std::mem::size_of::<PerMeshCB>() % 16, 0);
    assert_eq!(std::mem::size_of::<PerMeshInstanceCB>(), 16);
    assert_eq!(std::mem::size_of::<PerObjectCB>() % 16, 0);
    assert_eq!(std::mem::size_of::<PerMaterialCB>() % 16, 0);
    assert_eq!(std::mem::size_of::<ViewCB>() % 16, 0);
    assert_eq!(std::mem::size_of::<LightCB>() % 16, 0);
    assert_eq!(std::mem::size_of::<ClusterLodNode>() % 16, 0);
    assert_eq!(std::mem::size_of::<IndirectDispatchMeshCommand>(), 32);
}

#[test]
fn test_traversal_metric_keeps_sphere_xyz_contiguous() {
    // Spatial sorts read the center as a raw float3 at the struct base
    let metric = ClusterLodTraversalMetric {
        bounding_sphere_x: 1.0,
        bounding_sphere_y: 2.0,
        bounding_sphere_z: 3.0,
        bounding_sphere_radius: 4.0,
        max_quadric_error: 5.0,
        _pad: [0.0; 3],
    };
    let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&metric));
    assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
}

#[test]
fn test_default_material_cb_uses_invalid_slots() {
    let cb = PerMaterialCB::default();
    assert_eq!(cb.base_color_texture_index, u32::MAX);
    assert_eq!(cb.base_color_factor, [1.0; 4]);
    assert_eq!(cb.alpha_cutoff, 0.5);
}
