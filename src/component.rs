// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component types, the type registry and component sets
//!
//! Components are plain data stored by value inside chunk columns.
//! The registry hands out a small stable id per component type.
//! Component sets group several components for batched reads and writes.

use std::any::{type_name, TypeId};
use std::sync::Arc;

use bytemuck::Pod;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use crate::archetype::ComponentGroup;
use crate::chunk::CHUNK_ALIGN;
use crate::entity::Entity;
use crate::signature::{ArchetypeSignature, MAX_COMPONENT_TYPES};

/// Maximum number of components supported by ComponentSet implementations
pub const MAX_SET_COMPONENTS: usize = 8;

/// Component list small enough to stay inline for typical archetypes
pub type ComponentInfos = SmallVec<[ComponentInfo; MAX_SET_COMPONENTS]>;

/// Marker trait for components
///
/// Components are plain old data: they are copied in and out of chunk
/// columns byte for byte and never dropped.
pub trait Component: Pod + Send + Sync + 'static {}

/// Automatically implement Component for all valid types
impl<T: Pod + Send + Sync + 'static> Component for T {}

/// Stable small integer identifying a component type within a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Id of the built-in [`Entity`] component in every registry.
pub const ENTITY_COMPONENT_ID: ComponentTypeId = ComponentTypeId(0);

/// Size and identity of one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    /// Rust type identity, used to resolve columns without the registry
    #[serde(skip)]
    pub type_key: TypeId,
    pub size: usize,
    pub align: usize,
    pub name: &'static str,
}

impl ComponentInfo {
    /// Info for `T` from the global registry.
    pub fn of<T: Component>() -> Self {
        ComponentRegistry::global().info::<T>()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_type: FxHashMap<TypeId, ComponentInfo>,
    by_id: Vec<ComponentInfo>,
}

impl RegistryInner {
    fn register<T: Component>(&mut self) -> ComponentInfo {
        let index = self.by_id.len();
        assert!(
            index < MAX_COMPONENT_TYPES,
            "component registry is full ({MAX_COMPONENT_TYPES} types), cannot register {}",
            type_name::<T>()
        );
        assert!(
            std::mem::align_of::<T>() <= CHUNK_ALIGN,
            "component {} requires alignment {}, chunks only guarantee {CHUNK_ALIGN}",
            type_name::<T>(),
            std::mem::align_of::<T>()
        );

        let info = ComponentInfo {
            id: ComponentTypeId(index as u16),
            type_key: TypeId::of::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            name: type_name::<T>(),
        };
        self.by_type.insert(TypeId::of::<T>(), info);
        self.by_id.push(info);

        #[cfg(feature = "profiling")]
        tracing::debug!(
            component = info.name,
            id = index,
            size = info.size,
            "registered component type"
        );

        info
    }
}

/// Assigns component type ids on first use.
///
/// Lookups of already registered types only take the shared side of the
/// lock; the first lookup of a new type takes the exclusive side, so
/// concurrent first lookups of different types are serialised.
pub struct ComponentRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL_REGISTRY: Lazy<Arc<ComponentRegistry>> =
    Lazy::new(|| Arc::new(ComponentRegistry::new()));

impl ComponentRegistry {
    /// Create a registry with only the built-in `Entity` component.
    pub fn new() -> Self {
        let mut inner = RegistryInner::default();
        let entity = inner.register::<Entity>();
        debug_assert_eq!(entity.id, ENTITY_COMPONENT_ID);
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Process-wide registry, initialised on first access.
    pub fn global() -> &'static Arc<ComponentRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Info for `T`, registering it if needed.
    ///
    /// # Panics
    /// Panics if the registry already holds [`MAX_COMPONENT_TYPES`] types or
    /// `T` needs a stricter alignment than chunks provide.
    pub fn info<T: Component>(&self) -> ComponentInfo {
        let type_id = TypeId::of::<T>();
        if let Some(info) = self.inner.read().by_type.get(&type_id) {
            return *info;
        }

        let mut inner = self.inner.write();
        // Another thread may have won the race between the two locks
        if let Some(info) = inner.by_type.get(&type_id) {
            return *info;
        }
        inner.register::<T>()
    }

    #[inline]
    pub fn type_id<T: Component>(&self) -> ComponentTypeId {
        self.info::<T>().id
    }

    /// Id of `T` without registering it.
    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.inner
            .read()
            .by_type
            .get(&TypeId::of::<T>())
            .map(|info| info.id)
    }

    pub fn info_by_id(&self, id: ComponentTypeId) -> Option<ComponentInfo> {
        self.inner.read().by_id.get(id.index()).copied()
    }

    pub fn name_of(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.info_by_id(id).map(|info| info.name)
    }

    /// Number of registered component types
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Never true: the `Entity` component is always registered
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuple of components read or written together.
pub trait ComponentSet: Sized + Send + Sync + 'static {
    /// Infos of every component in the set, in declaration order
    fn component_infos(registry: &ComponentRegistry) -> ComponentInfos;

    fn signature(registry: &ComponentRegistry) -> ArchetypeSignature {
        Self::component_infos(registry)
            .iter()
            .map(|info| info.id)
            .collect()
    }

    /// Whether `Other` is one of the set's components
    fn contains<Other: 'static>() -> bool;

    /// Read every component of the slot at `index`
    fn read_from(group: &ComponentGroup, index: usize) -> Self;

    /// Write every component into the slot at `index`
    fn write_to(self, group: &mut ComponentGroup, index: usize);
}

// DO NOT implement ComponentSet for T: Component
// A single component is written as a one-element tuple

macro_rules! impl_component_set {
    ($($T:ident),*) => {
        impl<$($T: Component),*> ComponentSet for ($($T,)*) {
            fn component_infos(registry: &ComponentRegistry) -> ComponentInfos {
                smallvec![$(registry.info::<$T>()),*]
            }

            fn contains<Other: 'static>() -> bool {
                $(TypeId::of::<$T>() == TypeId::of::<Other>())||*
            }

            fn read_from(group: &ComponentGroup, index: usize) -> Self {
                ($(group.get_component_data::<$T>(index),)*)
            }

            #[allow(non_snake_case)]
            fn write_to(self, group: &mut ComponentGroup, index: usize) {
                let ($($T,)*) = self;
                $(group.set_component_data::<$T>(index, $T);)*
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Health(u32);

    #[test]
    fn test_entity_is_first_component() {
        let registry = ComponentRegistry::new();
        assert_eq!(registry.type_id::<Entity>(), ENTITY_COMPONENT_ID);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let registry = ComponentRegistry::new();
        let position = registry.type_id::<Position>();
        let health = registry.type_id::<Health>();
        assert_ne!(position, health);
        assert_eq!(registry.type_id::<Position>(), position);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_info_reports_size_and_name() {
        let registry = ComponentRegistry::new();
        let info = registry.info::<Position>();
        assert_eq!(info.size, 12);
        assert_eq!(info.align, 4);
        assert!(info.name.ends_with("Position"));
        assert_eq!(registry.info_by_id(info.id), Some(info));
    }

    #[test]
    fn test_lookup_does_not_register() {
        let registry = ComponentRegistry::new();
        assert_eq!(registry.lookup::<Health>(), None);
        let id = registry.type_id::<Health>();
        assert_eq!(registry.lookup::<Health>(), Some(id));
    }

    #[test]
    fn test_concurrent_first_lookups_agree() {
        let registry = Arc::new(ComponentRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (registry.type_id::<Position>(), registry.type_id::<Health>())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_set_signature() {
        let registry = ComponentRegistry::new();
        let signature = <(Position, Health)>::signature(&registry);
        assert!(signature.contains(registry.type_id::<Position>()));
        assert!(signature.contains(registry.type_id::<Health>()));
        assert!(!signature.contains(ENTITY_COMPONENT_ID));
        assert_eq!(<(Position, Health)>::component_infos(&registry).len(), 2);
    }

    #[test]
    fn test_set_contains() {
        assert!(<(Position, Health)>::contains::<Health>());
        assert!(<(Entity, Health)>::contains::<Entity>());
        assert!(!<(Position,)>::contains::<Entity>());
    }

    #[test]
    #[should_panic(expected = "chunks only guarantee")]
    fn test_over_aligned_component_rejected() {
        #[repr(C, align(16))]
        #[derive(Clone, Copy)]
        struct Wide([u8; 16]);
        // SAFETY: plain byte array, no padding, any bit pattern is valid
        unsafe impl Zeroable for Wide {}
        unsafe impl Pod for Wide {}

        ComponentRegistry::new().type_id::<Wide>();
    }
}
