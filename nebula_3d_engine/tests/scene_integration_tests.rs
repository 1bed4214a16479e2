//! Scene + manager integration: indirect workload growth (S3) and shadow
//! slice budgets over a populated scene.

use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3, Vec4};
use nebula_3d_engine::camera::CameraInfo;
use nebula_3d_engine::ecs::components::{Light, LightType};
use nebula_3d_engine::ecs::{phase, World};
use nebula_3d_engine::managers::Managers;
use nebula_3d_engine::material::{Material, MaterialDescription};
use nebula_3d_engine::mesh::{Mesh, MeshData, MeshInstance, VertexFlags};
use nebula_3d_engine::resources::{DeletionManager, FrameTick, GpuServices, ResourceManager,
    UploadManager};
use nebula_3d_engine::rhi::mock_device::MockDevice;
use nebula_3d_engine::rhi::Device;
use nebula_3d_engine::scene::Scene;
use nebula_3d_engine::settings::SettingsStore;
use nebula_3d_engine::shader_buffers::BoundingSphere;

struct Fixture {
    resources: ResourceManager,
    upload: UploadManager,
    deletion: DeletionManager,
    managers: Managers,
    world: World,
}

impl Fixture {
    fn new() -> Self {
        let device: Arc<Mutex<dyn Device>> = Arc::new(Mutex::new(MockDevice::new()));
        let mut resources = ResourceManager::new(device.clone(), 3).unwrap();
        let mut upload = UploadManager::new(device, 3).unwrap();
        let mut deletion = DeletionManager::new(3);
        // Small shadow maps keep the mock device's backing allocations cheap
        let settings = SettingsStore::new(nebula_3d_engine::settings::RenderSettings {
            shadow_resolution: 64,
            ..Default::default()
        });
        let managers = {
            let mut gpu = GpuServices {
                resources: &mut resources,
                upload: &mut upload,
                deletion: &mut deletion,
                tick: FrameTick { frame: 0, slot: 0 },
            };
            Managers::new(&mut gpu, &settings).unwrap()
        };
        Self {
            resources,
            upload,
            deletion,
            managers,
            world: World::new(),
        }
    }

}

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

// S3: 100 instances of one material; primary view + 1 directional light
// with 4 cascades. Every (view, phase, compileFlags) workload the technique
// names must hold >= 100 commands, across >= 15 workloads.
#[test]
fn test_indirect_workloads_accommodate_instance_count() {
    let mut fixture = Fixture::new();
    let mut scene = Scene::new(&mut fixture.world, "main");

    // Primary camera
    let camera_entity = scene.create_entity(&mut fixture.world);
    scene.add_camera(&mut fixture.world, camera_entity, CameraInfo::default());

    // Directional light with the default 4 cascades
    let light_entity = scene.create_entity(&mut fixture.world);
    scene.add_light(
        &mut fixture.world,
        light_entity,
        Light {
            light_type: LightType::Directional,
            color: Vec4::ONE,
            intensity: 5.0,
            attenuation: Vec3::ZERO,
            direction: Vec3::new(-0.3, -1.0, -0.2),
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
            range: 0.0,
            bounding_sphere: BoundingSphere::default(),
            casts_shadows: true,
        },
    );

    // 100 instances of one shared mesh/material
    let material = Material::from_description(&MaterialDescription::default());
    let mesh = triangle_mesh(material);
    for _ in 0..100 {
        let entity = scene.create_entity(&mut fixture.world);
        let instance = MeshInstance::new(mesh.clone());
        scene.make_renderable(&mut fixture.world, entity, vec![instance], Mat4::IDENTITY);
    }

    {
        let Fixture {
            resources,
            upload,
            deletion,
            managers,
            world,
        } = &mut fixture;
        let mut gpu = GpuServices {
            resources,
            upload,
            deletion,
            tick: FrameTick { frame: 1, slot: 1 },
        };
        scene.activate(world, &mut gpu, managers).unwrap();
    }

    // 5 views (primary + 4 cascades), 4 phases in the opaque technique
    assert!(fixture.managers.indirect.workload_count() >= 15);

    let technique = mesh.material.technique().clone();
    let cascades = fixture
        .world
        .get::<nebula_3d_engine::ecs::components::LightViewInfo>(light_entity)
        .unwrap()
        .view_ids
        .clone();
    assert_eq!(cascades.len(), 4);

    let mut views = cascades;
    let camera_view = fixture
        .world
        .get::<nebula_3d_engine::ecs::components::RenderViewRef>(camera_entity)
        .unwrap()
        .0;
    views.push(camera_view);

    for view in views {
        for participation in technique.participations() {
            let workload = fixture
                .managers
                .indirect
                .workload(view, participation.phase, participation.compile_flags)
                .expect("workload for technique participation");
            assert!(
                workload.capacity >= 100,
                "workload for {} holds only {} commands",
                participation.phase.name,
                workload.capacity
            );
        }
    }
}

// Shadow slice budget over a mixed light set: 6K + C + S slices
#[test]
fn test_shadow_slice_allocation_over_scene() {
    let mut fixture = Fixture::new();
    let mut scene = Scene::new(&mut fixture.world, "lights");

    let lights = [
        (LightType::Point, 3),
        (LightType::Directional, 1),
        (LightType::Spot, 2),
    ];
    for (light_type, count) in lights {
        for _ in 0..count {
            let entity = scene.create_entity(&mut fixture.world);
            scene.add_light(
                &mut fixture.world,
                entity,
                Light {
                    light_type,
                    color: Vec4::ONE,
                    intensity: 1.0,
                    attenuation: Vec3::new(1.0, 0.0, 0.0),
                    direction: Vec3::NEG_Y,
                    inner_cone_angle: 0.3,
                    outer_cone_angle: 0.5,
                    range: 10.0,
                    bounding_sphere: BoundingSphere {
                        center: [0.0, 5.0, 0.0],
                        radius: 10.0,
                    },
                    casts_shadows: true,
                },
            );
        }
    }

    {
        let Fixture {
            resources,
            upload,
            deletion,
            managers,
            world,
        } = &mut fixture;
        let mut gpu = GpuServices {
            resources,
            upload,
            deletion,
            tick: FrameTick { frame: 1, slot: 1 },
        };
        scene.activate(world, &mut gpu, managers).unwrap();
    }

    // 6*3 + 4 + 2*1 = 24 slices
    assert_eq!(fixture.managers.lights.shadow_slice_count(), 24);
}

// PerPassMeshes filtering: blended materials appear only in the forward
// phase partition
#[test]
fn test_blended_instances_partition_to_forward_only() {
    let mut fixture = Fixture::new();
    let mut scene = Scene::new(&mut fixture.world, "blend");
    let entity = scene.create_entity(&mut fixture.world);

    let blended = Material::from_description(&MaterialDescription {
        blend_state: nebula_3d_engine::rhi::BlendMode::AlphaBlend,
        ..Default::default()
    });
    let mesh = triangle_mesh(blended);
    scene.make_renderable(
        &mut fixture.world,
        entity,
        vec![MeshInstance::new(mesh)],
        Mat4::IDENTITY,
    );

    {
        let Fixture {
            resources,
            upload,
            deletion,
            managers,
            world,
        } = &mut fixture;
        let mut gpu = GpuServices {
            resources,
            upload,
            deletion,
            tick: FrameTick { frame: 1, slot: 1 },
        };
        scene.activate(world, &mut gpu, managers).unwrap();
    }

    let per_pass = fixture
        .world
        .get::<nebula_3d_engine::ecs::components::PerPassMeshes>(entity)
        .unwrap();
    assert!(per_pass.0.contains_key(&phase::FORWARD_PASS.hash));
    assert!(!per_pass.0.contains_key(&phase::GBUFFER_PASS.hash));
    assert!(!per_pass.0.contains_key(&phase::SHADOW_MAPS_PASS.hash));
}
