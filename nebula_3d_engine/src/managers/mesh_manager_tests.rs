use super::*;
use crate::material::Material;
use crate::mesh::{Mesh, MeshData, MeshInstance, Skeleton, VertexFlags};
use crate::test_support::Harness;

fn test_mesh(skinned: bool) -> std::sync::Arc<Mesh> {
    let mut data = MeshData {
        positions: vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
        ],
        normals: vec![0.0, 0.0, 1.0].repeat(4),
        indices: vec![0, 1, 2, 0, 2, 3],
        flags: VertexFlags::HAS_NORMALS,
        ..Default::default()
    };
    let skeleton = if skinned {
        data.flags |= VertexFlags::SKINNED;
        data.joints = Some(vec![0u16; 16]);
        data.weights = Some(vec![0.25f32; 16]);
        Some(Skeleton::new(Vec::new(), vec![glam::Mat4::IDENTITY; 4]))
    } else {
        None
    };
    Mesh::from_mesh_data(&data, Material::default_material(), skeleton, true).unwrap()
}

#[test]
fn test_add_mesh_bakes_pool_offsets_into_cb() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MeshManager::new(&mut gpu).unwrap()
    };
    let mesh = test_mesh(false);
    {
        let mut gpu = harness.gpu(1);
        manager.add_mesh(&mut gpu, &mesh, true).unwrap();
    }

    let cb = mesh.per_mesh_cb();
    assert_eq!(cb.num_meshlets, mesh.meshlet_count());
    let views = mesh.views();
    assert_eq!(
        cb.vertex_buffer_offset as u64,
        views.post_skinning_vertices.as_ref().unwrap().offset()
    );
    assert_eq!(
        cb.meshlet_buffer_offset as u64,
        views.meshlet_offsets.as_ref().unwrap().element_offset()
    );
    assert!(views.per_mesh.is_some());
    assert!(manager.contains_mesh(&mesh));
}

#[test]
fn test_duplicate_add_is_rejected() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MeshManager::new(&mut gpu).unwrap()
    };
    let mesh = test_mesh(false);
    let mut gpu = harness.gpu(1);
    manager.add_mesh(&mut gpu, &mesh, true).unwrap();
    let result = manager.add_mesh(&mut gpu, &mesh, true);
    assert!(matches!(
        result,
        Err(crate::error::Error::DuplicateResource(_))
    ));
}

#[test]
fn test_pool_accounting_over_add_remove_cycles() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MeshManager::new(&mut gpu).unwrap()
    };

    // Allocated bytes per pool equals the sum of live view sizes over any
    // add/remove sequence
    let meshes: Vec<_> = (0..4).map(|_| test_mesh(false)).collect();
    {
        let mut gpu = harness.gpu(1);
        for mesh in &meshes {
            manager.add_mesh(&mut gpu, mesh, true).unwrap();
        }
    }

    fn live_view_bytes(manager: &MeshManager, meshes: &[std::sync::Arc<Mesh>]) -> u64 {
        meshes
            .iter()
            .filter(|m| manager.contains_mesh(m))
            .map(|m| {
                m.views()
                    .meshlet_offsets
                    .as_ref()
                    .map(|v| v.size())
                    .unwrap_or(0)
            })
            .sum()
    }
    assert_eq!(
        manager.meshlet_offsets_pool().allocated_bytes(),
        live_view_bytes(&manager, &meshes)
    );

    manager.remove_mesh(&meshes[1]);
    manager.remove_mesh(&meshes[2]);
    assert_eq!(
        manager.meshlet_offsets_pool().allocated_bytes(),
        live_view_bytes(&manager, &meshes)
    );

    manager.remove_mesh(&meshes[0]);
    manager.remove_mesh(&meshes[3]);
    assert_eq!(manager.meshlet_offsets_pool().allocated_bytes(), 0);
    assert_eq!(manager.mesh_count(), 0);
}

#[test]
fn test_skinned_instance_owns_unique_post_skinning_range() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MeshManager::new(&mut gpu).unwrap()
    };
    let mesh = test_mesh(true);
    let mut gpu = harness.gpu(1);
    manager.add_mesh(&mut gpu, &mesh, true).unwrap();

    let a = MeshInstance::new(mesh.clone());
    let b = MeshInstance::new(mesh.clone());
    manager.add_mesh_instance(&mut gpu, &a, true).unwrap();
    manager.add_mesh_instance(&mut gpu, &b, true).unwrap();

    let offset_a = a.per_mesh_instance_cb().post_skinning_vertex_offset;
    let offset_b = b.per_mesh_instance_cb().post_skinning_vertex_offset;
    assert_ne!(offset_a, offset_b, "skinned instances must not share ranges");
    assert!(a.views().post_skinning_vertices.is_some());

    let allocated = manager.post_skinning_pool().allocated_bytes();
    manager.remove_mesh_instance(&a);
    assert!(manager.post_skinning_pool().allocated_bytes() < allocated);
}

#[test]
fn test_non_skinned_instance_shares_mesh_range() {
    let mut harness = Harness::new();
    let mut manager = {
        let mut gpu = harness.gpu(1);
        MeshManager::new(&mut gpu).unwrap()
    };
    let mesh = test_mesh(false);
    let mut gpu = harness.gpu(1);
    manager.add_mesh(&mut gpu, &mesh, true).unwrap();

    let instance = MeshInstance::new(mesh.clone());
    manager.add_mesh_instance(&mut gpu, &instance, true).unwrap();

    assert!(instance.views().post_skinning_vertices.is_none());
    assert_eq!(
        instance.per_mesh_instance_cb().post_skinning_vertex_offset as u64,
        mesh.views().post_skinning_vertices.as_ref().unwrap().offset()
    );
}
