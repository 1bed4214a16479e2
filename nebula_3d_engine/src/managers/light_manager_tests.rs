use super::*;
use crate::ecs::components::{Light, LightType};
use crate::managers::{ViewFlags, ViewManager};
use crate::ecs::World;
use crate::settings::SettingsStore;
use crate::shader_buffers::BoundingSphere;
use crate::test_support::Harness;
use glam::{Vec3, Vec4};

fn light(light_type: LightType, casts_shadows: bool) -> Light {
    Light {
        light_type,
        color: Vec4::ONE,
        intensity: 10.0,
        attenuation: Vec3::new(1.0, 0.09, 0.032),
        direction: Vec3::new(0.0, -1.0, 0.2),
        inner_cone_angle: 0.4,
        outer_cone_angle: 0.6,
        range: 25.0,
        bounding_sphere: BoundingSphere {
            center: [1.0, 4.0, -2.0],
            radius: 25.0,
        },
        casts_shadows,
    }
}

struct Setup {
    harness: Harness,
    views: ViewManager,
    lights: LightManager,
    world: World,
}

fn setup() -> Setup {
    let mut harness = Harness::new();
    // Small shadow maps keep the mock device's backing allocations cheap
    let settings = SettingsStore::new(crate::settings::RenderSettings {
        shadow_resolution: 64,
        ..Default::default()
    });
    let (views, lights) = {
        let mut gpu = harness.gpu(1);
        let views = ViewManager::new(&mut gpu).unwrap();
        let lights = LightManager::new(&mut gpu, &settings).unwrap();
        (views, lights)
    };
    Setup {
        harness,
        views,
        lights,
        world: World::new(),
    }
}

#[test]
fn test_shadow_slice_budget_matches_light_types() {
    let mut s = setup();
    let mut gpu = s.harness.gpu(1);

    // 2 point lights, 1 directional (4 cascades by default), 1 spot
    for _ in 0..2 {
        let entity = s.world.create_entity();
        s.lights
            .add_light(&mut gpu, &mut s.views, entity, &light(LightType::Point, true))
            .unwrap();
    }
    let directional = s.world.create_entity();
    s.lights
        .add_light(&mut gpu, &mut s.views, directional, &light(LightType::Directional, true))
        .unwrap();
    let spot = s.world.create_entity();
    s.lights
        .add_light(&mut gpu, &mut s.views, spot, &light(LightType::Spot, true))
        .unwrap();

    // 6K + C + S = 6*2 + 4 + 1
    assert_eq!(s.lights.shadow_slice_count(), 17);
    assert_eq!(s.views.view_count(), 17);
}

#[test]
fn test_shadow_caster_gets_depth_map_and_views() {
    let mut s = setup();
    let mut gpu = s.harness.gpu(1);
    let entity = s.world.create_entity();
    let added = s
        .lights
        .add_light(&mut gpu, &mut s.views, entity, &light(LightType::Point, true))
        .unwrap();

    let shadow_map = added.shadow_map.expect("depth map");
    assert_eq!(shadow_map.depth.array_layers(), 6);
    assert_eq!(shadow_map.linear_depth.array_layers(), 6);
    assert_eq!(added.light_view_info.view_ids.len(), 6);

    // Every face view received the depth targets
    for &id in &added.light_view_info.view_ids {
        let view = s.views.view(id).unwrap();
        assert!(view.flags().contains(ViewFlags::SHADOW_VIEW));
        assert!(view.depth().is_some());
    }
}

#[test]
fn test_non_caster_gets_constants_only() {
    let mut s = setup();
    let mut gpu = s.harness.gpu(1);
    let entity = s.world.create_entity();
    let added = s
        .lights
        .add_light(&mut gpu, &mut s.views, entity, &light(LightType::Point, false))
        .unwrap();
    assert!(added.shadow_map.is_none());
    assert!(added.light_view_info.view_ids.is_empty());
    assert_eq!(added.light_view_info.view_buffer_slot, u32::MAX);
    assert_eq!(s.lights.shadow_slice_count(), 0);
}

#[test]
fn test_remove_light_releases_views_and_slices() {
    let mut s = setup();
    let mut gpu = s.harness.gpu(1);
    let entity = s.world.create_entity();
    s.lights
        .add_light(&mut gpu, &mut s.views, entity, &light(LightType::Spot, true))
        .unwrap();
    assert_eq!(s.lights.shadow_slice_count(), 1);

    s.lights.remove_light(&mut s.views, entity);
    assert_eq!(s.lights.shadow_slice_count(), 0);
    assert_eq!(s.lights.light_count(), 0);
    assert_eq!(s.views.view_count(), 0);
}
