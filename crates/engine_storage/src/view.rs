//! Multi-component intersection queries.
//!
//! A [`View`] is bound to a registry and a fixed, ordered list of required
//! component types. Driving it over the registry's entity array answers,
//! per entity, "does it hold all of these?" and caches a payload pointer
//! per required type for the entity that last answered yes.
//!
//! The view holds a shared borrow of the registry for its whole lifetime,
//! so nothing can destroy an entity or component out from under a cached
//! pointer while the view is alive.

use std::ptr::NonNull;

use engine_component::{Component, ComponentTypeId, EntitySlot};

use crate::registry::Registry;

/// One required component type: the identity the view resolves pools with.
struct Required {
    type_id: ComponentTypeId,
    name: &'static str,
}

/// A query over entities holding a fixed combination of component types.
///
/// Built with [`View::new`] and one [`View::require`] call per type:
///
/// ```rust,ignore
/// let mut view = View::new(&registry).require::<Position>().require::<Velocity>();
/// for slot in view.entities() {
///     if view.has_required(slot) {
///         let position = view.get::<Position>().unwrap();
///     }
/// }
/// ```
pub struct View<'a> {
    registry: &'a Registry,
    required: Vec<Required>,
    /// Cached payload pointers, parallel to `required`, for the entity most
    /// recently checked.
    cached: Vec<Option<NonNull<u8>>>,
}

impl<'a> View<'a> {
    /// Create a view over `registry` with an empty requirement list.
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            required: Vec::new(),
            cached: Vec::new(),
        }
    }

    /// Append `T` to the view's required types.
    #[must_use]
    pub fn require<T: Component>(mut self) -> Self {
        self.required.push(Required {
            type_id: ComponentTypeId::of::<T>(),
            name: T::type_name(),
        });
        self.cached.push(None);
        self
    }

    /// Number of required component types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.required.len()
    }

    /// Iterate the registry's full entity array, destroyed slots included —
    /// callers filter those through [`View::has_required`].
    pub fn entities(&self) -> impl Iterator<Item = EntitySlot> + use<'a> {
        self.registry.entities().iter().copied()
    }

    /// Check whether the slot's entity holds every required component,
    /// caching one payload pointer per type on success.
    ///
    /// A destroyed slot is never a match. Requirements are checked in
    /// registration order and the scan stops at the first one unmet.
    pub fn has_required(&mut self, slot: EntitySlot) -> bool {
        let Some(entity) = slot.entity() else {
            return false;
        };
        self.cached.fill(None);

        // A single-type view needs no counting: one lookup decides.
        if let [only] = self.required.as_slice() {
            let hit = self
                .registry
                .pool_for_query(only.type_id, only.name)
                .and_then(|pool| pool.lookup(entity));
            self.cached[0] = hit;
            return hit.is_some();
        }

        let mut found = 0;
        for (index, required) in self.required.iter().enumerate() {
            let Some(ptr) = self
                .registry
                .pool_for_query(required.type_id, required.name)
                .and_then(|pool| pool.lookup(entity))
            else {
                return false;
            };
            self.cached[index] = Some(ptr);
            found += 1;
        }
        found == self.required.len()
    }

    /// The component cached for `T` by the most recent successful
    /// [`View::has_required`] call. `None` if no check has succeeded or `T`
    /// is not among the required types.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&'a T> {
        let type_id = ComponentTypeId::of::<T>();
        let index = self
            .required
            .iter()
            .position(|required| required.type_id == type_id && required.name == T::type_name())?;
        self.cached[index].map(|ptr| {
            // SAFETY: the pointer was cached from T's pool during the last
            // check, and the registry borrow held by this view keeps the
            // slot alive and un-recycled for 'a.
            unsafe { &*ptr.as_ptr().cast::<T>() }
        })
    }
}
