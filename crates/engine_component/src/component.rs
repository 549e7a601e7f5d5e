//! Core [`Component`] trait and per-type metadata.
//!
//! Every piece of data stored in the engine must implement [`Component`].
//! A component type's identity is derived from its **string name** with the
//! FNV-1a 64-bit hash, so independently compiled call sites agree on which
//! pool a type belongs to without any central type registry.
//!
//! [`ComponentInfo`] is the capability record a pool captures at creation:
//! after that point the pool only ever sees type-erased byte pointers, and
//! the callbacks in the record are the sole surviving knowledge of the
//! original type.

use std::alloc::Layout;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
///
/// The id is deterministic: any call site that applies FNV-1a to the same
/// UTF-8 name bytes produces the same `ComponentTypeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// This is the **canonical** way to derive a type id; every pool lookup
    /// and registration path goes through it, directly or via
    /// [`ComponentTypeId::of`].
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// The capability record for one component type.
///
/// Built once — from a Rust type via [`ComponentInfo::of`], or from explicit
/// parts via [`ComponentInfo::from_raw_parts`] for callers without static
/// type information — and handed to a pool at creation. All later operations
/// on that pool's type-erased payload bytes go through these callbacks.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// The unique type identifier, always `ComponentTypeId::from_name(&name)`.
    pub type_id: ComponentTypeId,
    /// The canonical name of the component type (e.g. `"Position"`).
    pub name: String,
    /// Size and alignment of one component instance.
    pub layout: Layout,
    /// Default-construct a component into uninitialised payload bytes.
    ///
    /// Present on records built for the type-erased allocation path; the
    /// statically typed path moves a caller-built value instead and needs no
    /// constructor callback.
    pub default_fn: Option<unsafe fn(*mut u8)>,
    /// Drop a component in place. Absent for types with no drop glue.
    pub drop_fn: Option<unsafe fn(*mut u8)>,
}

impl ComponentInfo {
    /// Returns the capability record for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: ComponentTypeId::of::<T>(),
            name: T::type_name().to_string(),
            layout: Layout::new::<T>(),
            default_fn: None,
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(|ptr: *mut u8| unsafe {
                    std::ptr::drop_in_place(ptr as *mut T);
                })
            } else {
                None
            },
        }
    }

    /// Returns the record for `T` with a default-construct callback, so the
    /// pool can also serve type-erased allocations.
    #[must_use]
    pub fn of_default<T: Component + Default>() -> Self {
        Self {
            default_fn: Some(|ptr: *mut u8| unsafe {
                std::ptr::write(ptr as *mut T, T::default());
            }),
            ..Self::of::<T>()
        }
    }

    /// Build a record from explicit parts, for callers without static type
    /// information (e.g. a dynamically typed scripting bridge).
    ///
    /// The type id is always derived from `name`, so a record can never
    /// carry a hash that disagrees with its own name.
    ///
    /// # Safety contract
    ///
    /// `default_fn` must initialise a valid value of the described type when
    /// handed `layout.size()` writable bytes at `layout.align()` alignment,
    /// and `drop_fn` (when present) must accept a pointer to such a value.
    #[must_use]
    pub fn from_raw_parts(
        name: impl Into<String>,
        layout: Layout,
        default_fn: unsafe fn(*mut u8),
        drop_fn: Option<unsafe fn(*mut u8)>,
    ) -> Self {
        let name = name.into();
        Self {
            type_id: ComponentTypeId::from_name(&name),
            name,
            layout,
            default_fn: Some(default_fn),
            drop_fn,
        }
    }
}

/// The core component trait.
///
/// Components are plain data records belonging to exactly one entity. The
/// engine is single-threaded, so no `Send`/`Sync` bound is required.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug, PartialEq)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: 'static {
    /// The canonical name for this component type.
    ///
    /// The name is the type's identity: two types with the same name are the
    /// same type as far as pool resolution is concerned.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Returns the [`ComponentInfo`] capability record for this component.
    fn info() -> ComponentInfo
    where
        Self: Sized,
    {
        ComponentInfo::of::<Self>()
    }
}
