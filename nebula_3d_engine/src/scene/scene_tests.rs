use super::*;
use crate::ecs::components::*;
use crate::ecs::{phase, World};
use crate::managers::Managers;
use crate::material::{Material, MaterialDescription};
use crate::mesh::{Mesh, MeshData, MeshInstance, VertexFlags};
use crate::settings::SettingsStore;
use crate::test_support::Harness;
use glam::Mat4;
use std::sync::Arc;

fn triangle_mesh(material: Arc<Material>) -> Arc<Mesh> {
    let data = MeshData {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        normals: vec![0.0, 0.0, 1.0].repeat(3),
        indices: vec![0, 1, 2],
        flags: VertexFlags::HAS_NORMALS,
        ..Default::default()
    };
    Mesh::from_mesh_data(&data, material, None, false).unwrap()
}

struct Setup {
    harness: Harness,
    managers: Managers,
    world: World,
}

fn setup() -> Setup {
    let mut harness = Harness::new();
    let settings = SettingsStore::default();
    let managers = {
        let mut gpu = harness.gpu(1);
        Managers::new(&mut gpu, &settings).unwrap()
    };
    Setup {
        harness,
        managers,
        world: World::new(),
    }
}

#[test]
fn test_entities_parent_to_scene_root() {
    let mut s = setup();
    let scene = Scene::new(&mut s.world, "main");
    let entity = scene.create_entity(&mut s.world);

    assert!(s.world.has::<SceneRoot>(scene.root()));
    let node = s.world.get::<SceneNode>(entity).unwrap();
    assert_eq!(node.parent, Some(scene.root()));
    assert_eq!(scene.subtree(&s.world), vec![entity]);
}

#[test]
fn test_activation_builds_per_pass_partition() {
    let mut s = setup();
    let mut scene = Scene::new(&mut s.world, "main");
    let entity = scene.create_entity(&mut s.world);

    let material = Material::from_description(&MaterialDescription::default());
    let mesh = triangle_mesh(material);
    let instance = MeshInstance::new(mesh.clone());
    scene.make_renderable(&mut s.world, entity, vec![instance], Mat4::IDENTITY);

    let mut gpu = s.harness.gpu(1);
    scene.activate(&mut s.world, &mut gpu, &mut s.managers).unwrap();
    assert!(scene.is_active());

    // For each instance there is a PerPassMeshes entry for every phase the
    // material technique declares, plus the ParticipatesInPass relation
    let per_pass = s.world.get::<PerPassMeshes>(entity).unwrap();
    for phase in [phase::Z_PREPASS, phase::GBUFFER_PASS, phase::SHADOW_MAPS_PASS,
        phase::FORWARD_PASS]
    {
        assert_eq!(per_pass.0.get(&phase.hash).map(|v| v.len()), Some(1));
    }
    let participates = s.world.get::<ParticipatesInPass>(entity).unwrap();
    assert_eq!(participates.0.len(), 4);
    for &phase_entity in &participates.0 {
        assert!(s.world.has::<RenderPhaseTag>(phase_entity));
    }

    assert!(s.world.has::<Active>(entity));
    assert!(s.world.get::<ObjectDrawInfo>(entity).is_some());
    assert_eq!(s.managers.mesh.mesh_count(), 1);
    assert_eq!(s.managers.materials.material_count(), 1);
    assert_eq!(s.managers.objects.object_count(), 1);
}

#[test]
fn test_shared_mesh_registers_once() {
    let mut s = setup();
    let mut scene = Scene::new(&mut s.world, "main");
    let material = Material::from_description(&MaterialDescription::default());
    let mesh = triangle_mesh(material);

    for _ in 0..3 {
        let entity = scene.create_entity(&mut s.world);
        let instance = MeshInstance::new(mesh.clone());
        scene.make_renderable(&mut s.world, entity, vec![instance], Mat4::IDENTITY);
    }

    let mut gpu = s.harness.gpu(1);
    scene.activate(&mut s.world, &mut gpu, &mut s.managers).unwrap();

    assert_eq!(s.managers.mesh.mesh_count(), 1);
    assert_eq!(s.managers.objects.object_count(), 3);
    // Use count reflects all three instances of the shared material
    assert_eq!(s.managers.materials.use_count(&mesh.material), 3);
}

#[test]
fn test_deactivation_detaches_everything() {
    let mut s = setup();
    let mut scene = Scene::new(&mut s.world, "main");
    let entity = scene.create_entity(&mut s.world);
    let material = Material::from_description(&MaterialDescription::default());
    let mesh = triangle_mesh(material);
    scene.make_renderable(
        &mut s.world,
        entity,
        vec![MeshInstance::new(mesh.clone())],
        Mat4::IDENTITY,
    );

    {
        let mut gpu = s.harness.gpu(1);
        scene.activate(&mut s.world, &mut gpu, &mut s.managers).unwrap();
    }
    let mut gpu = s.harness.gpu(2);
    scene.deactivate(&mut s.world, &mut gpu, &mut s.managers).unwrap();

    assert!(!scene.is_active());
    assert!(!s.world.has::<Active>(entity));
    assert!(!s.world.has::<PerPassMeshes>(entity));
    assert_eq!(s.managers.objects.object_count(), 0);
    assert_eq!(s.managers.materials.material_count(), 0);
}

#[test]
fn test_child_scenes_activate_with_parent() {
    let mut s = setup();
    let mut parent = Scene::new(&mut s.world, "parent");
    let mut child = Scene::new(&mut s.world, "child");
    let child_entity = child.create_entity(&mut s.world);
    let material = Material::from_description(&MaterialDescription::default());
    child.make_renderable(
        &mut s.world,
        child_entity,
        vec![MeshInstance::new(triangle_mesh(material))],
        Mat4::IDENTITY,
    );
    parent.add_child_scene(child);

    let mut gpu = s.harness.gpu(1);
    parent.activate(&mut s.world, &mut gpu, &mut s.managers).unwrap();
    assert_eq!(parent.child_count(), 1);
    assert_eq!(s.managers.mesh.mesh_count(), 1);
}
