//! Entity lifecycle and the pool directory.
//!
//! The [`Registry`] is the single owner of all storage state: the entity
//! array, the stack of destroyed ids awaiting recycling, and one [`Pool`]
//! per component type seen so far. Pools are created lazily, at most once
//! per type, and are found by a linear scan over their type hashes — the
//! directory is expected to stay small (one entry per component *type*,
//! not per component).

use std::ptr::NonNull;

use engine_component::{Component, ComponentInfo, ComponentTypeId, Entity, EntitySlot};
use tracing::{debug, trace, warn};

use crate::error::StorageError;
use crate::pool::Pool;

/// Slots per block for pools the registry creates when no explicit block
/// size was supplied.
pub const DEFAULT_BLOCK_SIZE: usize = 30;

/// Owner of the entity array and every component pool.
#[derive(Debug)]
pub struct Registry {
    /// Entity identity, indexed by id. Destroyed slots stay in place until
    /// their id is recycled.
    entities: Vec<EntitySlot>,
    /// Destroyed ids, recycled most-recently-destroyed first.
    destroyed: Vec<Entity>,
    /// One pool per component type, searched linearly by type hash.
    pools: Vec<Pool>,
    default_block_size: usize,
}

impl Registry {
    /// Create an empty registry using [`DEFAULT_BLOCK_SIZE`] for lazily
    /// created pools.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            destroyed: Vec::new(),
            pools: Vec::new(),
            default_block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Override the block size used for lazily created pools.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    #[must_use]
    pub fn with_default_block_size(mut self, block_size: usize) -> Self {
        assert!(block_size > 0, "default block size must be larger than 0");
        self.default_block_size = block_size;
        self
    }

    // -- Entity lifecycle --

    /// Mint a new entity id, reusing the most recently destroyed id if one
    /// is waiting. Sequential calls with no destructions yield `0, 1, 2, …`.
    pub fn create_entity(&mut self) -> Entity {
        if let Some(entity) = self.destroyed.pop() {
            self.entities[entity.index()] = EntitySlot::Active(entity);
            trace!(%entity, "recycled entity id");
            return entity;
        }
        let entity = Entity::from_raw(self.entities.len() as u64);
        self.entities.push(EntitySlot::Active(entity));
        trace!(%entity, "created entity");
        entity
    }

    /// Destroy an entity and release every component it owns.
    ///
    /// The id only becomes available for recycling here, so no id is ever
    /// live in two places at once.
    ///
    /// # Errors
    ///
    /// [`StorageError::EntityOutOfRange`] for an id the registry never
    /// minted, [`StorageError::EntityDestroyed`] if the entity is already
    /// destroyed.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), StorageError> {
        let slot = self
            .entities
            .get_mut(entity.index())
            .ok_or(StorageError::EntityOutOfRange(entity))?;
        if !slot.is_active() {
            return Err(StorageError::EntityDestroyed(entity));
        }
        *slot = EntitySlot::Destroyed;
        self.destroyed.push(entity);

        // No component may outlive its entity: release its slot (at most
        // one) in every pool.
        for pool in &mut self.pools {
            pool.release(entity);
        }
        trace!(%entity, "destroyed entity");
        Ok(())
    }

    /// Returns `true` if `entity` is currently live.
    #[must_use]
    pub fn is_active(&self, entity: Entity) -> bool {
        self.entities
            .get(entity.index())
            .is_some_and(|slot| slot.is_active())
    }

    /// The full entity array, destroyed slots included. Views iterate this.
    #[must_use]
    pub fn entities(&self) -> &[EntitySlot] {
        &self.entities
    }

    /// Number of entity slots ever minted, live or not.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of currently live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entities.len() - self.destroyed.len()
    }

    // -- Pool directory --

    /// Find the pool for a type hash. Linear scan; the hash is taken at
    /// face value since the caller supplied no name to verify against.
    #[must_use]
    pub fn get_pool(&self, type_id: ComponentTypeId) -> Option<&Pool> {
        self.find_pool_index(type_id).map(|index| &self.pools[index])
    }

    /// Iterate over all registered pools.
    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    /// Number of registered pools (one per component type seen so far).
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    // -- Component operations --

    /// Move `value` into a pool slot owned by `entity`, creating the pool
    /// for `T` on first use with the registry's default block size.
    ///
    /// # Errors
    ///
    /// An entity error if `entity` is not live, or
    /// [`StorageError::TypeContradiction`] if the type hash resolves to a
    /// pool registered under a different name.
    pub fn create_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<&mut T, StorageError> {
        self.ensure_active(entity)?;
        let index = match self.checked_pool_index::<T>("allocate")? {
            Some(index) => index,
            None => self.register_pool(Pool::for_type::<T>(self.default_block_size)),
        };
        self.pools[index].allocate(entity, value)
    }

    /// Borrow `entity`'s component of type `T`. Absence — of the pool or of
    /// the component — is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeContradiction`] on a hash collision with a
    /// differently named type.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<Option<&T>, StorageError> {
        match self.checked_pool_index::<T>("get")? {
            Some(index) => self.pools[index].get(entity),
            None => Ok(None),
        }
    }

    /// Mutably borrow `entity`'s component of type `T`.
    ///
    /// # Errors
    ///
    /// As [`Registry::get_component`].
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<&mut T>, StorageError> {
        match self.checked_pool_index::<T>("get")? {
            Some(index) => self.pools[index].get_mut(entity),
            None => Ok(None),
        }
    }

    /// Release `entity`'s component of type `T`, running its destructor and
    /// recycling the slot. `Ok(false)` if the entity holds none.
    ///
    /// # Errors
    ///
    /// As [`Registry::get_component`].
    pub fn free_component<T: Component>(&mut self, entity: Entity) -> Result<bool, StorageError> {
        match self.checked_pool_index::<T>("free")? {
            Some(index) => self.pools[index].free::<T>(entity),
            None => Ok(false),
        }
    }

    // -- Type-erased bridge --

    /// Component creation for callers without static type information: the
    /// capability record carries the name, layout, and callbacks, and an
    /// optional block size applies only if this call registers the pool.
    ///
    /// When the pool already exists, the first registration's block size
    /// wins; a differing override is logged and ignored.
    ///
    /// # Errors
    ///
    /// An entity error if `entity` is not live,
    /// [`StorageError::TypeContradiction`] if the record's hash resolves to
    /// a pool registered under a different name, or
    /// [`StorageError::NoDefaultConstructor`] if the pool cannot
    /// default-construct.
    pub fn create_component_raw(
        &mut self,
        entity: Entity,
        info: ComponentInfo,
        block_size: Option<usize>,
    ) -> Result<NonNull<u8>, StorageError> {
        self.ensure_active(entity)?;
        let index = match self.find_pool_index(info.type_id) {
            Some(index) => {
                let pool = &self.pools[index];
                if pool.name() != info.name {
                    return Err(StorageError::TypeContradiction {
                        pool: pool.name().to_string(),
                        requested: info.name,
                        operation: "allocate",
                    });
                }
                if let Some(requested) = block_size
                    && requested != pool.block_size()
                {
                    warn!(
                        pool = pool.name(),
                        current = pool.block_size(),
                        requested,
                        "ignoring block size override; first registration wins"
                    );
                }
                index
            }
            None => {
                let size = block_size.unwrap_or(self.default_block_size);
                self.register_pool(Pool::new(info, size))
            }
        };
        self.pools[index].allocate_raw(entity)
    }

    /// Type-erased lookup of `entity`'s payload pointer by bare type hash.
    #[must_use]
    pub fn get_component_raw(
        &self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<NonNull<u8>> {
        self.get_pool(type_id).and_then(|pool| pool.lookup(entity))
    }

    // -- Internal --

    /// Pool resolution for the view's boolean path: a hash hit whose name
    /// disagrees cannot be reported as an error there, so it is logged and
    /// treated as absent.
    pub(crate) fn pool_for_query(&self, type_id: ComponentTypeId, name: &str) -> Option<&Pool> {
        let pool = self.get_pool(type_id)?;
        if pool.name() != name {
            warn!(
                pool = pool.name(),
                requested = name,
                "type hash collision during query; treating pool as absent"
            );
            return None;
        }
        Some(pool)
    }

    fn ensure_active(&self, entity: Entity) -> Result<(), StorageError> {
        match self.entities.get(entity.index()) {
            None => Err(StorageError::EntityOutOfRange(entity)),
            Some(slot) if !slot.is_active() => Err(StorageError::EntityDestroyed(entity)),
            Some(_) => Ok(()),
        }
    }

    fn find_pool_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.pools.iter().position(|pool| pool.type_id() == type_id)
    }

    /// Resolve `T`'s pool index, verifying the registered name besides the
    /// hash so a collision between distinct types cannot go unnoticed.
    fn checked_pool_index<T: Component>(
        &self,
        operation: &'static str,
    ) -> Result<Option<usize>, StorageError> {
        let Some(index) = self.find_pool_index(ComponentTypeId::of::<T>()) else {
            return Ok(None);
        };
        let pool = &self.pools[index];
        if pool.name() != T::type_name() {
            return Err(StorageError::TypeContradiction {
                pool: pool.name().to_string(),
                requested: T::type_name().to_string(),
                operation,
            });
        }
        Ok(Some(index))
    }

    fn register_pool(&mut self, pool: Pool) -> usize {
        debug!(
            pool = pool.name(),
            block_size = pool.block_size(),
            "registered component pool"
        );
        self.pools.push(pool);
        self.pools.len() - 1
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::Layout;
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    struct Tracked {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl Component for Tracked {
        fn type_name() -> &'static str {
            "Tracked"
        }
    }

    #[test]
    fn test_sequential_ids() {
        let mut registry = Registry::new();
        for expected in 0..5 {
            assert_eq!(registry.create_entity(), Entity::from_raw(expected));
        }
        assert_eq!(registry.entity_count(), 5);
        assert_eq!(registry.live_count(), 5);
    }

    #[test]
    fn test_destroyed_ids_recycle_most_recent_first() {
        let mut registry = Registry::new();
        let e0 = registry.create_entity();
        let e1 = registry.create_entity();
        let e2 = registry.create_entity();

        registry.destroy_entity(e1).unwrap();
        registry.destroy_entity(e2).unwrap();

        // LIFO: entity 2 was destroyed last, so its id comes back first,
        // before any new id is minted.
        assert_eq!(registry.create_entity(), e2);
        assert_eq!(registry.create_entity(), e1);
        assert_eq!(registry.create_entity(), Entity::from_raw(3));
        assert!(registry.is_active(e0));
    }

    #[test]
    fn test_destroy_marks_slot_and_releases_components() {
        let drops = Rc::new(Cell::new(0));
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry
            .create_component(entity, Tracked { drops: drops.clone() })
            .unwrap();
        registry
            .create_component(entity, Position { x: 1.0, y: 2.0 })
            .unwrap();

        registry.destroy_entity(entity).unwrap();

        // Exactly one destructor ran, and the entity slot is destroyed.
        assert_eq!(drops.get(), 1);
        assert_eq!(registry.entities()[entity.index()], EntitySlot::Destroyed);
        assert!(!registry.is_active(entity));
        assert!(registry.get_component::<Position>(entity).unwrap().is_none());
    }

    #[test]
    fn test_destroy_twice_errors() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.destroy_entity(entity).unwrap();

        let err = registry.destroy_entity(entity).unwrap_err();
        assert!(matches!(err, StorageError::EntityDestroyed(e) if e == entity));
    }

    #[test]
    fn test_destroy_out_of_range_errors() {
        let mut registry = Registry::new();
        let err = registry.destroy_entity(Entity::from_raw(99)).unwrap_err();
        assert!(matches!(err, StorageError::EntityOutOfRange(_)));
    }

    #[test]
    fn test_create_component_on_destroyed_entity_errors() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.destroy_entity(entity).unwrap();

        let err = registry
            .create_component(entity, Position::default())
            .unwrap_err();
        assert!(matches!(err, StorageError::EntityDestroyed(_)));
    }

    #[test]
    fn test_component_roundtrip() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry
            .create_component(entity, Position { x: 3.0, y: 4.0 })
            .unwrap();

        let got = registry.get_component::<Position>(entity).unwrap().unwrap();
        assert_eq!(*got, Position { x: 3.0, y: 4.0 });
    }

    #[test]
    fn test_pool_created_lazily_at_most_once() {
        let mut registry = Registry::new();
        let e0 = registry.create_entity();
        let e1 = registry.create_entity();

        assert_eq!(registry.pool_count(), 0);
        registry.create_component(e0, Position::default()).unwrap();
        registry.create_component(e1, Position::default()).unwrap();
        registry.create_component(e0, Velocity { dx: 0.0, dy: 0.0 }).unwrap();

        assert_eq!(registry.pool_count(), 2);
        let pool = registry.get_pool(Position::component_type_id()).unwrap();
        assert_eq!(pool.block_size(), DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_default_block_size_override() {
        let mut registry = Registry::new().with_default_block_size(2);
        let entity = registry.create_entity();
        registry.create_component(entity, Position::default()).unwrap();

        let pool = registry.get_pool(Position::component_type_id()).unwrap();
        assert_eq!(pool.block_size(), 2);
    }

    #[test]
    fn test_free_component() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.create_component(entity, Position::default()).unwrap();

        assert!(registry.free_component::<Position>(entity).unwrap());
        assert!(registry.get_component::<Position>(entity).unwrap().is_none());
        assert!(!registry.free_component::<Position>(entity).unwrap());
        // The entity itself is still live.
        assert!(registry.is_active(entity));
    }

    #[test]
    fn test_get_component_without_pool_is_absent() {
        let registry = Registry::new();
        let absent = registry
            .get_component::<Position>(Entity::from_raw(0))
            .unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn test_raw_bridge_roundtrip() {
        unsafe fn construct_counter(ptr: *mut u8) {
            unsafe { std::ptr::write(ptr as *mut u64, 41) };
        }

        let mut registry = Registry::new();
        let entity = registry.create_entity();
        let info = ComponentInfo::from_raw_parts(
            "ScriptCounter",
            Layout::new::<u64>(),
            construct_counter,
            None,
        );

        let ptr = registry
            .create_component_raw(entity, info, Some(8))
            .unwrap();
        // SAFETY: the pool stores `u64` per the record above.
        let value = unsafe { *(ptr.as_ptr() as *const u64) };
        assert_eq!(value, 41);

        let type_id = ComponentTypeId::from_name("ScriptCounter");
        assert_eq!(registry.get_component_raw(entity, type_id), Some(ptr));
        assert_eq!(registry.get_pool(type_id).unwrap().block_size(), 8);
    }

    #[test]
    fn test_raw_block_size_first_registration_wins() {
        unsafe fn construct_flag(ptr: *mut u8) {
            unsafe { std::ptr::write(ptr, 1u8) };
        }

        let mut registry = Registry::new();
        let e0 = registry.create_entity();
        let e1 = registry.create_entity();
        let info = ComponentInfo::from_raw_parts(
            "ScriptFlag",
            Layout::new::<u8>(),
            construct_flag,
            None,
        );

        registry
            .create_component_raw(e0, info.clone(), Some(4))
            .unwrap();
        registry.create_component_raw(e1, info, Some(16)).unwrap();

        assert_eq!(registry.pool_count(), 1);
        let pool = registry.get_pool(ComponentTypeId::from_name("ScriptFlag")).unwrap();
        assert_eq!(pool.block_size(), 4);
    }
}
