/// Entity/component layer
///
/// A small sparse-set ECS: entities are slotmap keys, component stores are
/// `SecondaryMap`s, and queries over component combinations are cached and
/// invalidated by a structural version counter (amortizing scene traversal
/// for the per-pass geometry partitioning).
///
/// Mutation is single-threaded on the render thread; cached query results
/// are cheap entity-key vectors handed out by value.

pub mod phase;
pub mod components;

pub use phase::RenderPhase;

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHasher};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Stable entity key. Keys remain valid until their entity is destroyed.
    pub struct Entity;
}

// ===== COMPONENT STORAGE =====

trait ComponentStorage: Send + Sync {
    fn remove_entity(&mut self, entity: Entity);
    fn contains(&self, entity: Entity) -> bool;
    fn keys(&self) -> Vec<Entity>;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Storage<T: Send + Sync + 'static> {
    map: SecondaryMap<Entity, T>,
}

impl<T: Send + Sync + 'static> ComponentStorage for Storage<T> {
    fn remove_entity(&mut self, entity: Entity) {
        self.map.remove(entity);
    }
    fn contains(&self, entity: Entity) -> bool {
        self.map.contains_key(entity)
    }
    fn keys(&self) -> Vec<Entity> {
        self.map.keys().collect()
    }
    fn len(&self) -> usize {
        self.map.len()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct CachedQuery {
    version: u64,
    result: Vec<Entity>,
}

// ===== WORLD =====

pub struct World {
    entities: SlotMap<Entity, ()>,
    storages: FxHashMap<TypeId, Box<dyn ComponentStorage>>,
    /// Bumped on every structural change (entity or component add/remove)
    structural_version: u64,
    query_cache: Mutex<FxHashMap<u64, CachedQuery>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            storages: FxHashMap::default(),
            structural_version: 0,
            query_cache: Mutex::new(FxHashMap::default()),
        }
    }

    // ===== ENTITIES =====

    pub fn create_entity(&mut self) -> Entity {
        self.structural_version += 1;
        self.entities.insert(())
    }

    /// Destroy an entity and remove all its components
    pub fn destroy_entity(&mut self, entity: Entity) {
        if self.entities.remove(entity).is_some() {
            for storage in self.storages.values_mut() {
                storage.remove_entity(entity);
            }
            self.structural_version += 1;
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ===== COMPONENTS =====

    /// Attach (or replace) a component on an entity
    pub fn insert<T: Send + Sync + 'static>(&mut self, entity: Entity, component: T) {
        debug_assert!(self.entities.contains_key(entity), "insert on dead entity");
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Storage::<T> {
                    map: SecondaryMap::new(),
                })
            });
        let typed = storage
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .expect("storage type mismatch");
        if typed.map.insert(entity, component).is_none() {
            self.structural_version += 1;
        }
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<T> {
        let storage = self.storages.get_mut(&TypeId::of::<T>())?;
        let typed = storage.as_any_mut().downcast_mut::<Storage<T>>()?;
        let removed = typed.map.remove(entity);
        if removed.is_some() {
            self.structural_version += 1;
        }
        removed
    }

    pub fn get<T: Send + Sync + 'static>(&self, entity: Entity) -> Option<&T> {
        let storage = self.storages.get(&TypeId::of::<T>())?;
        let typed = storage.as_any().downcast_ref::<Storage<T>>()?;
        typed.map.get(entity)
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        let storage = self.storages.get_mut(&TypeId::of::<T>())?;
        let typed = storage.as_any_mut().downcast_mut::<Storage<T>>()?;
        typed.map.get_mut(entity)
    }

    pub fn has<T: Send + Sync + 'static>(&self, entity: Entity) -> bool {
        self.storages
            .get(&TypeId::of::<T>())
            .map(|s| s.contains(entity))
            .unwrap_or(false)
    }

    /// Number of entities carrying component `T`
    pub fn count<T: Send + Sync + 'static>(&self) -> usize {
        self.storages
            .get(&TypeId::of::<T>())
            .map(|s| s.len())
            .unwrap_or(0)
    }

    // ===== QUERIES =====

    /// Entities carrying component `A` (cached)
    pub fn query1<A: Send + Sync + 'static>(&self) -> Vec<Entity> {
        self.query_types(&[TypeId::of::<A>()])
    }

    /// Entities carrying both `A` and `B` (cached)
    pub fn query2<A: Send + Sync + 'static, B: Send + Sync + 'static>(&self) -> Vec<Entity> {
        self.query_types(&[TypeId::of::<A>(), TypeId::of::<B>()])
    }

    /// Entities carrying `A`, `B` and `C` (cached)
    pub fn query3<A, B, C>(&self) -> Vec<Entity>
    where
        A: Send + Sync + 'static,
        B: Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        self.query_types(&[TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>()])
    }

    /// Structural version, bumped by entity/component adds and removes
    pub fn structural_version(&self) -> u64 {
        self.structural_version
    }

    fn query_types(&self, types: &[TypeId]) -> Vec<Entity> {
        let key = {
            let mut hasher = FxHasher::default();
            for t in types {
                t.hash(&mut hasher);
            }
            hasher.finish()
        };

        let mut cache = self.query_cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(cached) = cache.get(&key) {
            if cached.version == self.structural_version {
                return cached.result.clone();
            }
        }

        // Re-evaluate: iterate the smallest storage, filter by the rest
        let result = self.evaluate_query(types);
        cache.insert(
            key,
            CachedQuery {
                version: self.structural_version,
                result: result.clone(),
            },
        );
        result
    }

    fn evaluate_query(&self, types: &[TypeId]) -> Vec<Entity> {
        let mut storages = Vec::with_capacity(types.len());
        for t in types {
            match self.storages.get(t) {
                Some(s) => storages.push(s.as_ref()),
                None => return Vec::new(),
            }
        }
        let (smallest_index, _) = storages
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.len())
            .expect("non-empty type list");

        storages[smallest_index]
            .keys()
            .into_iter()
            .filter(|&entity| {
                storages
                    .iter()
                    .enumerate()
                    .all(|(i, s)| i == smallest_index || s.contains(entity))
            })
            .collect()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "ecs_tests.rs"]
mod tests;
