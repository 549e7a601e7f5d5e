//! Block-allocated component pool with free-slot recycling.
//!
//! A [`Pool`] owns every instance of a single component type. Storage grows
//! in fixed-size blocks that are never released before the pool itself is
//! dropped, so a payload pointer stays stable for as long as its slot is
//! live. Released slots are recycled most-recently-freed first, which keeps
//! recently touched memory hot.
//!
//! The pool is type-erased: past construction, the only knowledge of the
//! component type is the [`ComponentInfo`] capability record captured from
//! it. The statically typed entry points re-check the claimed type against
//! that record before touching payload bytes.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use engine_component::{Component, ComponentInfo, ComponentTypeId, Entity, EntitySlot};
use tracing::trace;

use crate::error::StorageError;

/// One block of `block_size` slots.
///
/// Owner tags live in a plain array parallel to the raw payload buffer, so
/// scanning for an entity never touches component bytes. A `Destroyed` tag
/// marks a vacant slot.
struct Block {
    owners: Box<[EntitySlot]>,
    data: NonNull<u8>,
}

/// Block-allocated, free-list-recycled storage for one component type.
pub struct Pool {
    info: ComponentInfo,
    /// Bytes per slot: the element size rounded up to its alignment.
    stride: usize,
    /// Slots per block.
    block_size: usize,
    /// Layout of one block's payload buffer.
    block_layout: Layout,
    blocks: Vec<Block>,
    /// Linear index of the next never-used slot.
    cursor: usize,
    /// Released slot indices, reused most-recently-freed first.
    free_stack: Vec<usize>,
}

impl Pool {
    /// Create a pool for the type described by `info`, with `block_size`
    /// slots per block. No block is allocated until the first allocation.
    ///
    /// # Panics
    ///
    /// Panics if the record's name is empty, its element size is zero, or
    /// `block_size` is zero — these are programmer errors, not runtime
    /// conditions. Also panics if a block's byte size would overflow
    /// `usize`.
    #[must_use]
    pub fn new(info: ComponentInfo, block_size: usize) -> Self {
        assert!(!info.name.is_empty(), "pool type name must not be empty");
        assert!(info.layout.size() > 0, "pool element size must be larger than 0");
        assert!(block_size > 0, "pool block size must be larger than 0");

        let padded = info.layout.pad_to_align();
        let stride = padded.size();
        let block_bytes = stride
            .checked_mul(block_size)
            .expect("pool block byte size overflows usize");
        let block_layout = Layout::from_size_align(block_bytes, padded.align())
            .expect("pool block layout is invalid");

        Self {
            info,
            stride,
            block_size,
            block_layout,
            blocks: Vec::new(),
            cursor: 0,
            free_stack: Vec::new(),
        }
    }

    /// Create a pool for the Rust component type `T`.
    #[must_use]
    pub fn for_type<T: Component>(block_size: usize) -> Self {
        Self::new(ComponentInfo::of::<T>(), block_size)
    }

    /// The capability record this pool was created with.
    #[must_use]
    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// The stable identity of the stored component type.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.info.type_id
    }

    /// The canonical name of the stored component type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Slots per block.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently allocated.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total slots across all allocated blocks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    /// Number of live components in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor - self.free_stack.len()
    }

    /// Returns `true` if the pool holds no live components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `value` into a slot tagged with `entity` and return a reference
    /// to it.
    ///
    /// The most recently freed slot is reused if one exists; otherwise the
    /// next never-used slot is taken, growing the pool by one block when all
    /// blocks are full. Allocating a second component of the same type for
    /// one entity violates the pool invariant; lookups then resolve to the
    /// first slot in block order.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeContradiction`] if `T` is not the type this pool
    /// was created for.
    pub fn allocate<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<&mut T, StorageError> {
        self.check_type::<T>("allocate")?;
        let index = self.reserve_slot();
        let ptr = self.payload_ptr(index).as_ptr().cast::<T>();
        // SAFETY: the slot is unoccupied and stride-aligned for `T` (type
        // checked above); `write` takes ownership of `value`.
        unsafe { ptr.write(value) };
        self.set_owner(index, EntitySlot::Active(entity));
        // SAFETY: the value written above stays in place until the slot is
        // released or the pool is dropped.
        Ok(unsafe { &mut *ptr })
    }

    /// Default-construct a component into a slot tagged with `entity` and
    /// return the erased payload pointer. This is the allocation path for
    /// callers without static type information.
    ///
    /// # Errors
    ///
    /// [`StorageError::NoDefaultConstructor`] if the pool's capability
    /// record carries no default-construct callback.
    pub fn allocate_raw(&mut self, entity: Entity) -> Result<NonNull<u8>, StorageError> {
        let Some(default_fn) = self.info.default_fn else {
            return Err(StorageError::NoDefaultConstructor(self.info.name.clone()));
        };
        let index = self.reserve_slot();
        let ptr = self.payload_ptr(index);
        // SAFETY: the slot is unoccupied and sized/aligned per the pool's
        // capability record, which `default_fn` belongs to.
        unsafe { default_fn(ptr.as_ptr()) };
        self.set_owner(index, EntitySlot::Active(entity));
        Ok(ptr)
    }

    /// Release `entity`'s slot: run the destructor, tag the slot destroyed,
    /// and push it on the free stack. Returns `false` if the entity holds no
    /// component here.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeContradiction`] if `T` is not the type this pool
    /// was created for.
    pub fn free<T: Component>(&mut self, entity: Entity) -> Result<bool, StorageError> {
        self.check_type::<T>("free")?;
        Ok(self.release(entity))
    }

    /// Type-erased release, used by entity destruction and the dynamic
    /// bridge. Returns `false` if the entity holds no component here.
    pub fn release(&mut self, entity: Entity) -> bool {
        let Some(index) = self.position_of(entity) else {
            return false;
        };
        if let Some(drop_fn) = self.info.drop_fn {
            // SAFETY: an active slot holds a live value of the pool's type.
            unsafe { drop_fn(self.payload_ptr(index).as_ptr()) };
        }
        self.set_owner(index, EntitySlot::Destroyed);
        self.free_stack.push(index);
        true
    }

    /// Borrow `entity`'s component, or `None` if it holds none here.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeContradiction`] if `T` is not the type this pool
    /// was created for.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<Option<&T>, StorageError> {
        self.check_type::<T>("get")?;
        Ok(self.position_of(entity).map(|index| {
            // SAFETY: the type check above proves the slot holds a `T`, live
            // while its owner tag is active.
            unsafe { &*self.payload_ptr(index).as_ptr().cast::<T>() }
        }))
    }

    /// Mutably borrow `entity`'s component, or `None` if it holds none here.
    ///
    /// # Errors
    ///
    /// [`StorageError::TypeContradiction`] if `T` is not the type this pool
    /// was created for.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>, StorageError> {
        self.check_type::<T>("get")?;
        Ok(self.position_of(entity).map(|index| {
            // SAFETY: as in `get`, plus `&mut self` guarantees exclusivity.
            unsafe { &mut *self.payload_ptr(index).as_ptr().cast::<T>() }
        }))
    }

    /// Type-erased lookup of `entity`'s payload pointer.
    #[must_use]
    pub fn lookup(&self, entity: Entity) -> Option<NonNull<u8>> {
        self.position_of(entity).map(|index| self.payload_ptr(index))
    }

    /// Linear scan of owner tags in block-allocation order; cost grows with
    /// every slot the pool has ever handed out. All lookups go through this
    /// one seam, so a per-entity index can replace it without touching any
    /// caller.
    fn position_of(&self, entity: Entity) -> Option<usize> {
        self.blocks.iter().enumerate().find_map(|(block_index, block)| {
            block
                .owners
                .iter()
                .position(|owner| *owner == EntitySlot::Active(entity))
                .map(|slot| block_index * self.block_size + slot)
        })
    }

    fn check_type<T: Component>(&self, operation: &'static str) -> Result<(), StorageError> {
        if ComponentTypeId::of::<T>() != self.info.type_id || T::type_name() != self.info.name {
            return Err(StorageError::TypeContradiction {
                pool: self.info.name.clone(),
                requested: T::type_name().to_string(),
                operation,
            });
        }
        Ok(())
    }

    /// Pop the most recently freed slot, or take the next never-used one,
    /// growing by a block when every slot has been handed out.
    fn reserve_slot(&mut self) -> usize {
        if let Some(index) = self.free_stack.pop() {
            return index;
        }
        if self.cursor == self.capacity() {
            self.grow();
        }
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    fn grow(&mut self) {
        let owners = vec![EntitySlot::Destroyed; self.block_size].into_boxed_slice();
        // SAFETY: `block_layout` has a non-zero size (element size and block
        // size are both checked at construction).
        let raw = unsafe { alloc::alloc(self.block_layout) };
        let Some(data) = NonNull::new(raw) else {
            alloc::handle_alloc_error(self.block_layout);
        };
        self.blocks.push(Block { owners, data });
        trace!(pool = %self.info.name, blocks = self.blocks.len(), "allocated block");
    }

    fn payload_ptr(&self, index: usize) -> NonNull<u8> {
        let block = &self.blocks[index / self.block_size];
        let offset = (index % self.block_size) * self.stride;
        // SAFETY: `offset` is strictly inside the block's allocation.
        unsafe { block.data.add(offset) }
    }

    fn set_owner(&mut self, index: usize, owner: EntitySlot) {
        self.blocks[index / self.block_size].owners[index % self.block_size] = owner;
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        for block in &self.blocks {
            if let Some(drop_fn) = self.info.drop_fn {
                for (slot, owner) in block.owners.iter().enumerate() {
                    if owner.is_active() {
                        // SAFETY: active slots hold live values that were
                        // never released.
                        unsafe { drop_fn(block.data.as_ptr().add(slot * self.stride)) };
                    }
                }
            }
            // SAFETY: the block was allocated in `grow` with this layout.
            unsafe { alloc::dealloc(block.data.as_ptr(), self.block_layout) };
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.info.name)
            .field("type_id", &self.info.type_id)
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.len())
            .field("len", &self.len())
            .finish()
    }
}
