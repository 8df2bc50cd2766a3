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

//! Shared components: one value per space
//!
//! A shared component is stored once per [`Space`] instead of once per
//! entity. Every entity living in an archetype of that space sees the same
//! value, and moving an entity to another space changes the value it sees.

use std::any::{Any, TypeId};

use ahash::AHashMap;

use crate::entity::Space;

/// Marker trait for shared components
///
/// Values are compared when an entity is assigned a shared value, so two
/// entities given equal values end up in the same space.
pub trait SharedComponent: PartialEq + Send + Sync + 'static {}

impl<T: PartialEq + Send + Sync + 'static> SharedComponent for T {}

/// Type-erased shared values keyed by space and type.
#[derive(Default)]
pub struct SharedComponents {
    values: AHashMap<(Space, TypeId), Box<dyn Any + Send + Sync>>,
}

impl SharedComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `space`, returning the value it replaced.
    pub fn insert<T: SharedComponent>(&mut self, space: Space, value: T) -> Option<T> {
        self.values
            .insert((space, TypeId::of::<T>()), Box::new(value))
            .and_then(|previous| previous.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: SharedComponent>(&self, space: Space) -> Option<&T> {
        self.values
            .get(&(space, TypeId::of::<T>()))
            .and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: SharedComponent>(&mut self, space: Space) -> Option<&mut T> {
        self.values
            .get_mut(&(space, TypeId::of::<T>()))
            .and_then(|value| value.downcast_mut())
    }

    pub fn contains<T: SharedComponent>(&self, space: Space) -> bool {
        self.values.contains_key(&(space, TypeId::of::<T>()))
    }

    pub fn remove<T: SharedComponent>(&mut self, space: Space) -> Option<T> {
        self.values
            .remove(&(space, TypeId::of::<T>()))
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// Space whose `T` equals `value`, if any
    pub fn space_of<T: SharedComponent>(&self, value: &T) -> Option<Space> {
        let type_id = TypeId::of::<T>();
        self.values
            .iter()
            .filter(|((_, key_type), _)| *key_type == type_id)
            .find(|(_, stored)| stored.downcast_ref::<T>() == Some(value))
            .map(|((space, _), _)| *space)
    }

    /// Every space holding at least one shared value
    pub fn spaces(&self) -> impl Iterator<Item = Space> + '_ {
        self.values.keys().map(|(space, _)| *space)
    }

    /// Number of stored values across all spaces and types
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl std::fmt::Debug for SharedComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedComponents")
            .field("len", &self.values.len())
            .finish()
    }
}
