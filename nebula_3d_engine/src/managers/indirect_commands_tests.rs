use super::*;
use crate::camera::CameraInfo;
use crate::ecs::components::{IndirectArgumentsRef, IsIndirectArguments};
use crate::ecs::{phase, World};
use crate::material::{Material, MaterialDescription};
use crate::managers::{ViewFlags, ViewId, ViewManager};
use crate::test_support::Harness;

struct Setup {
    harness: Harness,
    views: ViewManager,
    manager: IndirectCommandBufferManager,
    world: World,
    primary: ViewId,
}

fn setup() -> Setup {
    let mut harness = Harness::new();
    let mut views = {
        let mut gpu = harness.gpu(1);
        ViewManager::new(&mut gpu).unwrap()
    };
    let mut world = World::new();
    let mut manager = IndirectCommandBufferManager::new();
    let primary = {
        let mut gpu = harness.gpu(1);
        let id = views
            .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::PRIMARY_CAMERA)
            .unwrap();
        manager.register_view(&mut gpu, &mut world, id).unwrap();
        id
    };
    Setup {
        harness,
        views,
        manager,
        world,
        primary,
    }
}

#[test]
fn test_technique_registration_creates_per_phase_workloads() {
    let mut s = setup();
    let material = Material::from_description(&MaterialDescription::default());
    let mut gpu = s.harness.gpu(1);
    s.manager
        .register_technique(&mut gpu, &mut s.world, material.technique())
        .unwrap();

    // Opaque techniques declare 4 phases; one workload each for the view
    assert_eq!(s.manager.workload_count(), 4);
    let gbuffer = s
        .manager
        .buffers_for_render_phase(s.primary, phase::GBUFFER_PASS);
    assert_eq!(gbuffer.len(), 1);

    // Each workload buffer carries a counter and an ECS discovery entity
    let (_, workload) = gbuffer[0];
    assert!(workload.buffer.counter_offset().is_some());
    assert!(s.world.has::<IsIndirectArguments>(workload.entity));
    assert!(s.world.has::<IndirectArgumentsRef>(workload.entity));
}

#[test]
fn test_update_grows_capacity_for_draw_count() {
    let mut s = setup();
    let material = Material::from_description(&MaterialDescription::default());
    let mut gpu = s.harness.gpu(1);
    s.manager
        .register_technique(&mut gpu, &mut s.world, material.technique())
        .unwrap();

    s.manager
        .update_buffers_for_technique(&mut gpu, &mut s.world, material.technique(), 100)
        .unwrap();

    for participation in material.technique().participations() {
        let workload = s
            .manager
            .workload(s.primary, participation.phase, participation.compile_flags)
            .expect("workload");
        assert!(workload.capacity >= 100);
    }
    // The retired buffers went through the resource manager's destroy path
    assert!(gpu.deletion.pending() > 0);
}

#[test]
fn test_views_registered_later_get_existing_techniques() {
    let mut s = setup();
    let material = Material::from_description(&MaterialDescription::default());
    {
        let mut gpu = s.harness.gpu(1);
        s.manager
            .register_technique(&mut gpu, &mut s.world, material.technique())
            .unwrap();
    }

    let shadow_view = {
        let mut gpu = s.harness.gpu(1);
        s.views
            .create_view(&mut gpu, &CameraInfo::default(), ViewFlags::SHADOW_VIEW)
            .unwrap()
    };
    let mut gpu = s.harness.gpu(1);
    s.manager
        .register_view(&mut gpu, &mut s.world, shadow_view)
        .unwrap();

    assert_eq!(s.manager.workload_count(), 8);
    assert_eq!(
        s.manager
            .buffers_for_render_phase(shadow_view, phase::SHADOW_MAPS_PASS)
            .len(),
        1
    );
}

#[test]
fn test_unregister_releases_a_views_workloads() {
    let mut s = setup();
    let material = Material::from_description(&MaterialDescription::default());
    let mut gpu = s.harness.gpu(1);
    s.manager
        .register_technique(&mut gpu, &mut s.world, material.technique())
        .unwrap();
    assert_eq!(s.manager.workload_count(), 4);

    s.manager.unregister_buffers(&mut s.world, s.primary);
    assert_eq!(s.manager.workload_count(), 0);
    assert!(s.world.query1::<IsIndirectArguments>().is_empty());
}
