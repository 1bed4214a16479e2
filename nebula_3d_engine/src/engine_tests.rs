use super::*;
use crate::scene::Scene;
use crate::settings::{RenderSettings, SettingsStore};
use crate::test_support::mock_device;

fn engine() -> RenderEngine {
    let settings = SettingsStore::new(RenderSettings {
        num_frames_in_flight: 2,
        ..Default::default()
    });
    RenderEngine::new(mock_device(), settings).unwrap()
}

#[test]
fn test_bring_up_and_empty_frames() {
    let mut engine = engine();
    assert_eq!(engine.current_frame(), 0);
    // An empty graph still runs: transitions-only loop-back batch, fence
    // signal, readback poll
    for _ in 0..5 {
        engine.render_frame().unwrap();
    }
    assert_eq!(engine.current_frame(), 5);
    engine.shutdown().unwrap();
}

#[test]
fn test_scene_activation_through_engine() {
    use crate::material::{Material, MaterialDescription};
    use crate::mesh::{Mesh, MeshData, MeshInstance, VertexFlags};
    use glam::Mat4;

    let mut engine = engine();
    let mut scene = Scene::new(engine.world_mut(), "main");
    let entity = scene.create_entity(engine.world_mut());

    let data = MeshData {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        normals: vec![0.0, 0.0, 1.0].repeat(3),
        indices: vec![0, 1, 2],
        flags: VertexFlags::HAS_NORMALS,
        ..Default::default()
    };
    let mesh = Mesh::from_mesh_data(
        &data,
        Material::from_description(&MaterialDescription::default()),
        None,
        false,
    )
    .unwrap();
    scene.make_renderable(
        engine.world_mut(),
        entity,
        vec![MeshInstance::new(mesh)],
        Mat4::IDENTITY,
    );

    engine.activate_scene(&mut scene).unwrap();
    assert_eq!(engine.managers().mesh.mesh_count(), 1);
    engine.render_frame().unwrap();
    engine.deactivate_scene(&mut scene).unwrap();
    assert_eq!(engine.managers().objects.object_count(), 0);
}
