use super::*;

#[derive(Debug, PartialEq)]
struct Health(u32);
struct Velocity(f32);
struct Tag;

#[test]
fn test_insert_get_remove() {
    let mut world = World::new();
    let entity = world.create_entity();
    world.insert(entity, Health(100));
    assert_eq!(world.get::<Health>(entity), Some(&Health(100)));

    world.get_mut::<Health>(entity).unwrap().0 = 50;
    assert_eq!(world.get::<Health>(entity).unwrap().0, 50);

    assert_eq!(world.remove::<Health>(entity), Some(Health(50)));
    assert!(world.get::<Health>(entity).is_none());
}

#[test]
fn test_destroy_entity_clears_components() {
    let mut world = World::new();
    let entity = world.create_entity();
    world.insert(entity, Health(1));
    world.insert(entity, Tag);
    world.destroy_entity(entity);
    assert!(!world.is_alive(entity));
    assert_eq!(world.count::<Health>(), 0);
    assert_eq!(world.count::<Tag>(), 0);
}

#[test]
fn test_query_intersects_component_sets() {
    let mut world = World::new();
    let a = world.create_entity();
    let b = world.create_entity();
    let c = world.create_entity();
    world.insert(a, Health(1));
    world.insert(a, Velocity(1.0));
    world.insert(b, Health(2));
    world.insert(c, Velocity(3.0));

    let both = world.query2::<Health, Velocity>();
    assert_eq!(both, vec![a]);
    assert_eq!(world.query1::<Health>().len(), 2);
    assert!(world.query1::<Tag>().is_empty());
}

#[test]
fn test_cached_query_invalidates_on_structural_change() {
    let mut world = World::new();
    let a = world.create_entity();
    world.insert(a, Health(1));

    // First evaluation populates the cache; repeated calls with no
    // structural change hit it
    let version = world.structural_version();
    assert_eq!(world.query1::<Health>().len(), 1);
    assert_eq!(world.query1::<Health>().len(), 1);
    assert_eq!(world.structural_version(), version);

    // A component add invalidates
    let b = world.create_entity();
    world.insert(b, Health(2));
    assert_eq!(world.query1::<Health>().len(), 2);

    // A component remove invalidates too
    world.remove::<Health>(a);
    assert_eq!(world.query1::<Health>().len(), 1);
}

#[test]
fn test_component_replacement_is_not_structural() {
    let mut world = World::new();
    let entity = world.create_entity();
    world.insert(entity, Health(1));
    let version = world.structural_version();
    // Replacing an existing component keeps cached queries valid
    world.insert(entity, Health(2));
    assert_eq!(world.structural_version(), version);
    assert_eq!(world.get::<Health>(entity).unwrap().0, 2);
}

#[test]
fn test_stale_keys_do_not_resolve() {
    let mut world = World::new();
    let entity = world.create_entity();
    world.insert(entity, Health(1));
    world.destroy_entity(entity);
    let replacement = world.create_entity();
    // The slotmap generation protects against ABA on the old key
    assert!(!world.is_alive(entity));
    assert!(world.is_alive(replacement));
    assert!(world.get::<Health>(entity).is_none());
}
