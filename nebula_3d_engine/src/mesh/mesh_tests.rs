use super::*;
use crate::material::Material;
use crate::mesh::{MeshData, MeshInstance, Skeleton, VertexFlags};
use glam::{Mat4, Vec3};

fn cube_data() -> MeshData {
    let mut positions = Vec::new();
    for z in [0.0f32, 1.0] {
        for y in [0.0f32, 1.0] {
            for x in [0.0f32, 1.0] {
                positions.extend_from_slice(&[x, y, z]);
            }
        }
    }
    MeshData {
        positions,
        normals: vec![0.0, 1.0, 0.0].repeat(8),
        indices: vec![0, 1, 2, 1, 3, 2, 4, 6, 5, 5, 6, 7],
        flags: VertexFlags::HAS_NORMALS,
        ..Default::default()
    }
}

#[test]
fn test_mesh_ids_are_globally_unique() {
    let material = Material::default_material();
    let a = Mesh::from_mesh_data(&cube_data(), material.clone(), None, false).unwrap();
    let b = Mesh::from_mesh_data(&cube_data(), material, None, false).unwrap();
    assert_ne!(a.global_id(), b.global_id());
}

#[test]
fn test_bounds_enclose_geometry() {
    let mesh =
        Mesh::from_mesh_data(&cube_data(), Material::default_material(), None, false).unwrap();
    let aabb = mesh.aabb();
    assert_eq!(aabb.min, Vec3::ZERO);
    assert_eq!(aabb.max, Vec3::ONE);

    let sphere = mesh.bounding_sphere();
    // The unit cube's furthest corner sits within the sphere
    let corner = Vec3::ONE;
    let center = Vec3::from_array(sphere.center);
    assert!((corner - center).length() <= sphere.radius + 1e-4);
}

#[test]
fn test_meshlet_reordered_blob_expands_shared_vertices() {
    let mesh =
        Mesh::from_mesh_data(&cube_data(), Material::default_material(), None, false).unwrap();
    // 8 unique vertices, but the reordered blob carries one slot per
    // meshlet-local vertex reference
    assert_eq!(mesh.num_vertices(false), 8);
    assert_eq!(
        mesh.num_vertices(true),
        mesh.meshlet_vertices().len() as u64
    );
}

#[test]
fn test_skinned_mesh_requires_base_skeleton() {
    let mut data = cube_data();
    data.flags |= VertexFlags::SKINNED;
    data.joints = Some(vec![0u16; 32]);
    data.weights = Some(vec![0.25f32; 32]);

    let no_skeleton =
        Mesh::from_mesh_data(&data, Material::default_material(), None, false);
    assert!(no_skeleton.is_err());

    let skeleton = Skeleton::new(Vec::new(), Vec::new());
    // Empty skeletons are fine at mesh level; the skinning manager rejects
    // them at activation
    let with_skeleton =
        Mesh::from_mesh_data(&data, Material::default_material(), Some(skeleton), false);
    assert!(with_skeleton.is_ok());
}

#[test]
fn test_instances_share_mesh_but_copy_skeleton() {
    let mut data = cube_data();
    data.flags |= VertexFlags::SKINNED;
    data.joints = Some(vec![0u16; 32]);
    data.weights = Some(vec![0.25f32; 32]);
    let skeleton = Skeleton::new(Vec::new(), vec![]);
    let mesh =
        Mesh::from_mesh_data(&data, Material::default_material(), Some(skeleton), false).unwrap();

    let a = MeshInstance::new(mesh.clone());
    let b = MeshInstance::new(mesh.clone());
    assert!(std::sync::Arc::ptr_eq(a.mesh(), b.mesh()));
    assert!(a.has_skin());
    // Each skinned instance owns a private skeleton copy
    assert!(!std::sync::Arc::ptr_eq(a.skin().unwrap(), b.skin().unwrap()));
}

#[test]
fn test_aabb_transform_is_tight() {
    let aabb = Aabb {
        min: Vec3::new(-1.0, -1.0, -1.0),
        max: Vec3::new(1.0, 1.0, 1.0),
    };
    let transformed = aabb.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
    assert_eq!(transformed.min, Vec3::new(4.0, -1.0, -1.0));
    assert_eq!(transformed.max, Vec3::new(6.0, 1.0, 1.0));
}

#[test]
fn test_cluster_lod_attaches_when_requested() {
    let mesh =
        Mesh::from_mesh_data(&cube_data(), Material::default_material(), None, true).unwrap();
    let clod = mesh.cluster_lod().expect("hierarchy");
    assert!(!clod.nodes.is_empty());
    assert_eq!(clod.meshlets.len(), mesh.meshlets().len());
}
