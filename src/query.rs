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

//! Archetype filtering and chunk iteration
//!
//! A filter selects archetypes by signature; iteration then walks the
//! chunks of every matching group and hands out typed column slices.

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ComponentGroup};
use crate::chunk::{ChunkView, ChunkViewMut};
use crate::component::{Component, ComponentRegistry, ComponentSet};
use crate::entity::Space;
use crate::manager::EntityManager;
use crate::signature::ArchetypeSignature;

/// Signature based archetype selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchetypeFilter {
    include: ArchetypeSignature,
    exclude: ArchetypeSignature,
    space: Option<Space>,
}

impl ArchetypeFilter {
    /// Filter matching every archetype
    pub fn new() -> Self {
        Self::default()
    }

    /// Archetypes storing every component of `S`
    pub fn of<S: ComponentSet>(registry: &ComponentRegistry) -> Self {
        Self {
            include: S::signature(registry),
            ..Self::default()
        }
    }

    pub fn with<T: Component>(mut self, registry: &ComponentRegistry) -> Self {
        self.include.insert(registry.type_id::<T>());
        self
    }

    pub fn without<T: Component>(mut self, registry: &ComponentRegistry) -> Self {
        self.exclude.insert(registry.type_id::<T>());
        self
    }

    /// Restrict matches to one space
    pub fn in_space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }

    pub fn include(&self) -> ArchetypeSignature {
        self.include
    }

    pub fn exclude(&self) -> ArchetypeSignature {
        self.exclude
    }

    #[inline]
    pub fn matches(&self, archetype: &Archetype) -> bool {
        let signature = archetype.signature();
        signature.contains_all(self.include)
            && !signature.intersects(self.exclude)
            && self.space.map_or(true, |space| space == archetype.space())
    }
}

impl EntityManager {
    /// Filter over the archetypes storing every component of `S`
    pub fn filter<S: ComponentSet>(&self) -> ArchetypeFilter {
        ArchetypeFilter::of::<S>(self.registry())
    }

    pub fn groups_matching<'a>(
        &'a self,
        filter: &'a ArchetypeFilter,
    ) -> impl Iterator<Item = (&'a Archetype, &'a ComponentGroup)> + 'a {
        self.archetypes()
            .iter()
            .zip(self.component_groups())
            .filter(move |(archetype, _)| filter.matches(archetype))
    }

    fn groups_matching_mut<'a>(
        &'a mut self,
        filter: &'a ArchetypeFilter,
    ) -> impl Iterator<Item = (&'a Archetype, &'a mut ComponentGroup)> + 'a {
        let (archetypes, groups) = self.split_groups_mut();
        archetypes
            .iter()
            .zip(groups.iter_mut())
            .filter(move |(archetype, _)| filter.matches(archetype))
    }

    /// Visit every non-empty chunk of the matching groups.
    pub fn for_each_chunk<F>(&self, filter: &ArchetypeFilter, mut f: F)
    where
        F: FnMut(ChunkView<'_>),
    {
        for (_, group) in self.groups_matching(filter) {
            for chunk in group.chunks().filter(|chunk| !chunk.is_empty()) {
                f(chunk);
            }
        }
    }

    pub fn for_each_chunk_mut<F>(&mut self, filter: &ArchetypeFilter, mut f: F)
    where
        F: FnMut(ChunkViewMut<'_>),
    {
        for (_, group) in self.groups_matching_mut(filter) {
            for chunk in group.chunks_mut().filter(|chunk| !chunk.is_empty()) {
                f(chunk);
            }
        }
    }

    /// Number of live entities in the matching groups
    pub fn count_matching(&self, filter: &ArchetypeFilter) -> usize {
        self.groups_matching(filter)
            .map(|(_, group)| group.len())
            .sum()
    }

    /// Parallel iteration over the chunks of the matching groups
    ///
    /// Groups and the chunks inside them are both fanned out on the rayon
    /// pool.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk<F>(&self, filter: &ArchetypeFilter, f: F)
    where
        F: Fn(ChunkView<'_>) + Send + Sync,
    {
        use rayon::prelude::*;

        #[cfg(feature = "profiling")]
        let span = info_span!("manager.par_for_each_chunk");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let groups: Vec<&ComponentGroup> = self
            .groups_matching(filter)
            .map(|(_, group)| group)
            .collect();

        groups.par_iter().for_each(|group| {
            group.par_for_each_chunk(|chunk| {
                if !chunk.is_empty() {
                    f(chunk);
                }
            });
        });
    }

    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk_mut<F>(&mut self, filter: &ArchetypeFilter, f: F)
    where
        F: Fn(ChunkViewMut<'_>) + Send + Sync,
    {
        use rayon::prelude::*;

        #[cfg(feature = "profiling")]
        let span = info_span!("manager.par_for_each_chunk_mut");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let groups: Vec<&mut ComponentGroup> = self
            .groups_matching_mut(filter)
            .map(|(_, group)| group)
            .collect();

        groups.into_par_iter().for_each(|group| {
            group.par_for_each_chunk_mut(|chunk| {
                if !chunk.is_empty() {
                    f(chunk);
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Position(f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Velocity(f32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Frozen(u32);

    fn populated() -> EntityManager {
        let mut manager = EntityManager::new();
        let moving = manager
            .create_entity_type_of::<(Position, Velocity)>(4, Space(0))
            .unwrap();
        let frozen = manager
            .create_entity_type_of::<(Position, Velocity, Frozen)>(4, Space(0))
            .unwrap();
        let still = manager.create_entity_type_of::<(Position,)>(4, Space(1)).unwrap();

        manager
            .create_entities_with(6, moving, (Position(0.0), Velocity(1.0)))
            .unwrap();
        manager
            .create_entities_with(2, frozen, (Position(0.0), Velocity(1.0), Frozen(1)))
            .unwrap();
        manager.create_entities(3, still).unwrap();
        manager
    }

    #[test]
    fn test_filter_include_exclude() {
        let manager = populated();
        let registry = manager.registry();

        let with_velocity = manager.filter::<(Velocity,)>();
        assert_eq!(manager.count_matching(&with_velocity), 8);

        let not_frozen = with_velocity.without::<Frozen>(registry);
        assert_eq!(manager.count_matching(&not_frozen), 6);

        let positions = ArchetypeFilter::new().with::<Position>(registry);
        assert_eq!(manager.count_matching(&positions), 11);
        assert_eq!(manager.count_matching(&positions.in_space(Space(1))), 3);
    }

    #[test]
    fn test_for_each_chunk_mut_updates_columns() {
        let mut manager = populated();
        let filter = manager.filter::<(Position, Velocity)>();

        manager.for_each_chunk_mut(&filter, |mut chunk| {
            let (positions, velocities) = chunk.column_pair_mut::<Position, Velocity>();
            for (p, v) in positions.iter_mut().zip(velocities.iter()) {
                p.0 += v.0;
            }
        });

        let mut seen = 0;
        manager.for_each_chunk(&filter, |chunk| {
            assert_eq!(chunk.entities().len(), chunk.len());
            assert!(chunk.column::<Position>().iter().all(|p| p.0 == 1.0));
            seen += chunk.len();
        });
        assert_eq!(seen, 8);
    }

    #[test]
    fn test_entities_column_matches_directory() {
        let manager = populated();
        let filter = manager.filter::<(Position,)>();
        manager.for_each_chunk(&filter, |chunk| {
            for (slot, entity) in chunk.entities().iter().enumerate() {
                let location = manager.location(*entity).unwrap();
                assert_eq!(location.index, chunk.index() * 4 + slot);
            }
        });
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_par_for_each_chunk_mut() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut manager = populated();
        let filter = manager.filter::<(Velocity,)>();
        manager.par_for_each_chunk_mut(&filter, |mut chunk| {
            for v in chunk.column_mut::<Velocity>() {
                v.0 *= 2.0;
            }
        });

        let visited = AtomicUsize::new(0);
        manager.par_for_each_chunk(&filter, |chunk| {
            assert!(chunk.column::<Velocity>().iter().all(|v| v.0 == 2.0));
            visited.fetch_add(chunk.len(), Ordering::Relaxed);
        });
        assert_eq!(visited.load(Ordering::Relaxed), 8);
    }
}
