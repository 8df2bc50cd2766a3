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

//! Entity manager: archetype registry and entity directory

use std::any::{type_name, TypeId};
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::smallvec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ComponentGroup};
use crate::chunk::ChunkViewMut;
use crate::command::CommandBuffer;
use crate::component::{
    Component, ComponentInfo, ComponentInfos, ComponentRegistry, ComponentSet,
    ENTITY_COMPONENT_ID,
};
use crate::config::StoreConfig;
use crate::debug::MemoryStats;
use crate::entity::{ArchetypeId, Entity, EntityLocation, Space};
use crate::error::{EcsError, Result, SpawnError};
use crate::shared::{SharedComponent, SharedComponents};
use crate::signature::ArchetypeSignature;
use crate::utils::pair_mut;

/// Directory slot of one entity index.
#[derive(Clone, Copy, Debug, Default)]
struct EntityRecord {
    /// Generation of the handle currently (or next) issued for this index
    generation: u32,
    /// `None` while the index sits on the free list
    location: Option<EntityLocation>,
}

/// Owns every archetype group and maps entity handles to their slots.
///
/// Destroyed indices are recycled LIFO with a bumped generation, so a handle
/// kept across a destroy no longer reports as alive.
pub struct EntityManager {
    registry: Arc<ComponentRegistry>,
    config: StoreConfig,

    /// Archetype metadata, indexed by `ArchetypeId`
    archetypes: Vec<Archetype>,

    /// Storage, parallel to `archetypes`
    groups: Vec<ComponentGroup>,

    /// Deduplicates archetypes by space and component set
    archetype_index: AHashMap<(Space, ArchetypeSignature), ArchetypeId>,

    records: Vec<EntityRecord>,
    free_list: Vec<u32>,
    live: usize,

    /// Shared component values, one per space and type
    shared: SharedComponents,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_registry(Arc::clone(ComponentRegistry::global()), config)
    }

    /// Manager with its own component registry.
    ///
    /// Infos passed to [`create_entity_type`](Self::create_entity_type) must
    /// come from the same registry.
    pub fn with_registry(registry: Arc<ComponentRegistry>, config: StoreConfig) -> Self {
        Self {
            registry,
            archetypes: Vec::with_capacity(config.initial_archetype_capacity),
            groups: Vec::with_capacity(config.initial_archetype_capacity),
            archetype_index: AHashMap::with_capacity(config.initial_archetype_capacity),
            records: Vec::with_capacity(config.initial_entity_capacity),
            free_list: Vec::new(),
            live: 0,
            shared: SharedComponents::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========== Archetypes ==========

    /// Find or create the archetype storing `component_infos` in `space`.
    ///
    /// The component list must contain `Entity`. Lists naming the same set in
    /// any order resolve to the same archetype, and the first call decides
    /// its chunk capacity and column order.
    pub fn create_entity_type(
        &mut self,
        capacity_per_chunk: usize,
        component_infos: &[ComponentInfo],
        space: Space,
    ) -> Result<ArchetypeId> {
        if capacity_per_chunk == 0 {
            return Err(EcsError::InvalidChunkCapacity);
        }

        let signature: ArchetypeSignature = component_infos.iter().map(|info| info.id).collect();
        if !signature.contains(ENTITY_COMPONENT_ID) {
            return Err(EcsError::MissingEntityComponent);
        }

        if let Some(&id) = self.archetype_index.get(&(space, signature)) {
            return Ok(id);
        }

        let id = ArchetypeId(self.archetypes.len());
        let group = ComponentGroup::with_registry(
            Arc::clone(&self.registry),
            component_infos,
            capacity_per_chunk,
        );

        #[cfg(feature = "profiling")]
        tracing::debug!(
            archetype = id.index(),
            space = space.0,
            components = signature.len(),
            capacity_per_chunk,
            chunk_bytes = group.chunk_bytes(),
            "created archetype"
        );

        self.archetypes.push(Archetype::new(id, space, signature));
        self.groups.push(group);
        self.archetype_index.insert((space, signature), id);
        Ok(id)
    }

    /// Archetype of `Entity` plus the components of `S`.
    pub fn create_entity_type_of<S: ComponentSet>(
        &mut self,
        capacity_per_chunk: usize,
        space: Space,
    ) -> Result<ArchetypeId> {
        let infos = self.infos_with_entity::<S>();
        self.create_entity_type(capacity_per_chunk, &infos, space)
    }

    /// Archetype of `Entity` plus `S`, with as many entities per chunk as fit
    /// in `config.default_chunk_bytes`.
    pub fn create_entity_type_for_chunk_size<S: ComponentSet>(
        &mut self,
        space: Space,
    ) -> Result<ArchetypeId> {
        let infos = self.infos_with_entity::<S>();
        let capacity_per_chunk = self.config.capacity_for_chunk(&infos);
        self.create_entity_type(capacity_per_chunk, &infos, space)
    }

    fn infos_with_entity<S: ComponentSet>(&self) -> ComponentInfos {
        let mut infos: ComponentInfos = smallvec![self.registry.info::<Entity>()];
        infos.extend(S::component_infos(&self.registry));
        infos
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn component_group(&self, id: ArchetypeId) -> Option<&ComponentGroup> {
        self.groups.get(id.index())
    }

    /// Mutable view of one chunk of an archetype.
    ///
    /// Slots cannot be added or removed through it, and the `Entity` column
    /// stays read-only, so directory records remain valid.
    pub fn chunk_mut(&mut self, id: ArchetypeId, chunk_index: usize) -> Option<ChunkViewMut<'_>> {
        let group = self.groups.get_mut(id.index())?;
        if chunk_index < group.num_chunks() {
            Some(group.chunk_mut(chunk_index))
        } else {
            None
        }
    }

    /// Mutable views over every chunk of an archetype; empty for unknown ids
    pub fn chunks_mut(&mut self, id: ArchetypeId) -> impl Iterator<Item = ChunkViewMut<'_>> + '_ {
        self.groups
            .get_mut(id.index())
            .into_iter()
            .flat_map(|group| group.chunks_mut())
    }

    /// Groups parallel to [`archetypes`](Self::archetypes)
    pub fn component_groups(&self) -> &[ComponentGroup] {
        &self.groups
    }

    pub(crate) fn split_groups_mut(&mut self) -> (&[Archetype], &mut [ComponentGroup]) {
        (&self.archetypes, &mut self.groups)
    }

    /// Live entities of one archetype, zero for unknown ids
    pub fn number_of_entities(&self, id: ArchetypeId) -> usize {
        self.groups.get(id.index()).map_or(0, ComponentGroup::len)
    }

    /// Grow the archetype's storage to hold `additional` more entities.
    pub fn reserve(&mut self, id: ArchetypeId, additional: usize) -> Result<()> {
        let group = self
            .groups
            .get_mut(id.index())
            .ok_or(EcsError::ArchetypeNotFound(id.index()))?;
        group.reserve(group.len() + additional);
        Ok(())
    }

    /// Release chunks no group needs.
    pub fn shrink_to_fit(&mut self) {
        #[cfg(feature = "profiling")]
        let span = info_span!("manager.shrink_to_fit", archetypes = self.groups.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        for group in &mut self.groups {
            group.shrink_to_fit();
        }
        self.free_list.shrink_to_fit();
    }

    // ========== Entities ==========

    /// Create an entity with zeroed components.
    ///
    /// # Panics
    /// Panics if the archetype is unknown or the directory already holds
    /// `config.max_entities` handles.
    pub fn create_entity(&mut self, archetype: ArchetypeId) -> Entity {
        let group_index = self.expect_group(archetype);
        self.spawn_in(archetype, group_index)
    }

    /// Create an entity and write `values` into it.
    ///
    /// # Panics
    /// Panics like [`create_entity`](Self::create_entity), or if `S`
    /// contains `Entity`.
    pub fn create_entity_with<S: ComponentSet>(&mut self, archetype: ArchetypeId, values: S) -> Entity {
        assert_owned_entity_untouched::<S>();
        let entity = self.create_entity(archetype);
        let index = self.expect_location(entity).index;
        self.groups[archetype.index()].set_components_data(index, values);
        entity
    }

    /// Create an entity with zeroed components, reporting exhaustion and
    /// unknown archetypes instead of panicking.
    pub fn try_create_entity(&mut self, archetype: ArchetypeId) -> Result<Entity> {
        let group_index = self.prepare_spawn(1, archetype)?;
        Ok(self.spawn_in(archetype, group_index))
    }

    /// Create `count` entities with zeroed components.
    ///
    /// Recycled indices are handed out first, most recently destroyed first.
    pub fn create_entities(&mut self, count: usize, archetype: ArchetypeId) -> Result<Vec<Entity>> {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "manager.create_entities",
            count,
            archetype = archetype.index()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let group_index = self.prepare_spawn(count, archetype)?;
        let mut entities = Vec::with_capacity(count);
        for _ in 0..count {
            entities.push(self.spawn_in(archetype, group_index));
        }
        Ok(entities)
    }

    /// Create `count` entities all initialised with `values`.
    pub fn create_entities_with<S: ComponentSet + Clone>(
        &mut self,
        count: usize,
        archetype: ArchetypeId,
        values: S,
    ) -> Result<Vec<Entity>> {
        assert_owned_entity_untouched::<S>();
        let entities = self.create_entities(count, archetype)?;
        let group = &mut self.groups[archetype.index()];
        for &entity in &entities {
            if let Some(location) = self.records[entity.index() as usize].location {
                group.set_components_data(location.index, values.clone());
            }
        }
        Ok(entities)
    }

    /// Create exactly `N` entities into a fixed-size array.
    pub fn create_entities_array<const N: usize>(
        &mut self,
        archetype: ArchetypeId,
    ) -> Result<[Entity; N]> {
        let group_index = self.prepare_spawn(N, archetype)?;
        let mut entities = [Entity::default(); N];
        for slot in &mut entities {
            *slot = self.spawn_in(archetype, group_index);
        }
        Ok(entities)
    }

    /// Validate a bulk creation up front and reserve its storage.
    fn prepare_spawn(&mut self, count: usize, archetype: ArchetypeId) -> Result<usize> {
        let group_index = archetype.index();
        if group_index >= self.groups.len() {
            return Err(EcsError::ArchetypeNotFound(group_index));
        }

        let available = self.free_list.len()
            + (self.config.max_entities as usize).saturating_sub(self.records.len());
        if count > available {
            return Err(SpawnError::EntityCapacityExhausted {
                attempted: count,
                capacity: available,
            }
            .into());
        }

        let minted = count.saturating_sub(self.free_list.len());
        self.records.reserve(minted);
        let group = &mut self.groups[group_index];
        group.reserve(group.len() + count);
        Ok(group_index)
    }

    fn spawn_in(&mut self, archetype: ArchetypeId, group_index: usize) -> Entity {
        let entity = self.allocate_handle();
        let group = &mut self.groups[group_index];
        let index = group.push_back();
        group.set_component_data(index, entity);

        self.records[entity.index() as usize].location = Some(EntityLocation { archetype, index });
        self.live += 1;
        entity
    }

    fn allocate_handle(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            let record = &self.records[index as usize];
            return Entity::new(index, record.generation);
        }

        let index = self.records.len();
        if index >= self.config.max_entities as usize {
            panic!("Entity handle exhaustion: {index} handles allocated");
        }
        self.records.push(EntityRecord::default());
        Entity::new(index as u32, 0)
    }

    /// Destroy an entity, recycling its index.
    ///
    /// The last entity of the archetype moves into the freed slot.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let location = self
            .location(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;

        let record = &mut self.records[entity.index() as usize];
        record.location = None;
        record.generation = record.generation.wrapping_add(1);
        self.free_list.push(entity.index());
        self.live -= 1;

        if let Some(moved) = self.groups[location.archetype.index()].erase(location.index) {
            if let Some(moved_location) = self.records[moved.entity.index() as usize]
                .location
                .as_mut()
            {
                moved_location.index = location.index;
            }
        }
        Ok(())
    }

    /// Destroy every entity in `entities`, stopping at the first dead handle.
    pub fn destroy_entities(&mut self, entities: &[Entity]) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("manager.destroy_entities", count = entities.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        for &entity in entities {
            self.destroy_entity(entity)?;
        }
        Ok(())
    }

    /// Destroy every entity; archetypes and their chunks stay allocated.
    pub fn clear(&mut self) {
        for (index, record) in self.records.iter_mut().enumerate() {
            if record.location.take().is_some() {
                record.generation = record.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        for group in &mut self.groups {
            group.clear();
        }
        self.live = 0;
    }

    /// Check if the handle refers to a live entity
    pub fn exists(&self, entity: Entity) -> bool {
        self.location(entity).is_some()
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.records
            .get(entity.index() as usize)
            .filter(|record| record.generation == entity.generation())
            .and_then(|record| record.location)
    }

    pub fn archetype_of(&self, entity: Entity) -> Option<ArchetypeId> {
        self.location(entity).map(|location| location.archetype)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.live
    }

    /// Indices waiting to be recycled
    pub fn recycled_entity_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.location(entity)
            .is_some_and(|location| self.groups[location.archetype.index()].has_component::<T>())
    }

    pub fn has_components<S: ComponentSet>(&self, entity: Entity) -> bool {
        let signature = S::signature(&self.registry);
        self.location(entity).is_some_and(|location| {
            self.groups[location.archetype.index()]
                .signature()
                .contains_all(signature)
        })
    }

    // ========== Component access ==========

    /// Read component `T` of a live entity.
    ///
    /// # Panics
    /// Panics if the entity is dead or its archetype lacks `T`.
    pub fn get_component_data<T: Component>(&self, entity: Entity) -> T {
        let location = self.expect_location(entity);
        self.groups[location.archetype.index()].get_component_data(location.index)
    }

    /// Write component `T` of a live entity.
    ///
    /// # Panics
    /// Panics if the entity is dead, its archetype lacks `T`, or `T` is
    /// `Entity`.
    pub fn set_component_data<T: Component>(&mut self, entity: Entity, value: T) {
        assert_owned_entity_untouched::<(T,)>();
        let location = self.expect_location(entity);
        self.groups[location.archetype.index()].set_component_data(location.index, value);
    }

    pub fn get_components_data<S: ComponentSet>(&self, entity: Entity) -> S {
        let location = self.expect_location(entity);
        self.groups[location.archetype.index()].get_components_data(location.index)
    }

    pub fn set_components_data<S: ComponentSet>(&mut self, entity: Entity, values: S) {
        assert_owned_entity_untouched::<S>();
        let location = self.expect_location(entity);
        self.groups[location.archetype.index()].set_components_data(location.index, values);
    }

    /// Read component `T`, or `None` for dead entities and missing components.
    pub fn component_data<T: Component>(&self, entity: Entity) -> Option<T> {
        let location = self.location(entity)?;
        let group = &self.groups[location.archetype.index()];
        group
            .has_component::<T>()
            .then(|| group.get_component_data(location.index))
    }

    pub fn try_set_component_data<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let location = self
            .location(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let group = &mut self.groups[location.archetype.index()];
        if !group.has_component::<T>() || TypeId::of::<T>() == TypeId::of::<Entity>() {
            return Err(EcsError::ComponentNotFound(type_name::<T>()));
        }
        group.set_component_data(location.index, value);
        Ok(())
    }

    // ========== Shared components ==========

    /// Store the shared `T` of `space`, returning the value it replaced.
    pub fn set_shared_component<T: SharedComponent>(&mut self, space: Space, value: T) -> Option<T> {
        self.shared.insert(space, value)
    }

    pub fn shared_component<T: SharedComponent>(&self, space: Space) -> Option<&T> {
        self.shared.get(space)
    }

    pub fn shared_component_mut<T: SharedComponent>(&mut self, space: Space) -> Option<&mut T> {
        self.shared.get_mut(space)
    }

    pub fn remove_shared_component<T: SharedComponent>(&mut self, space: Space) -> Option<T> {
        self.shared.remove(space)
    }

    pub fn shared_components(&self) -> &SharedComponents {
        &self.shared
    }

    /// Shared `T` seen by a live entity, through its archetype's space
    pub fn entity_shared_component<T: SharedComponent>(&self, entity: Entity) -> Option<&T> {
        let location = self.location(entity)?;
        self.shared.get(self.archetypes[location.archetype.index()].space())
    }

    /// Move an entity to the archetype with the same components in `space`.
    ///
    /// The target archetype is created on first use with the source's chunk
    /// capacity. The entity keeps its handle and component values; the
    /// source group is compacted with a swap-remove and the moved entity's
    /// record is patched.
    pub fn change_entity_space(&mut self, entity: Entity, space: Space) -> Result<EntityLocation> {
        let location = self
            .location(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let source = &self.archetypes[location.archetype.index()];
        if source.space() == space {
            return Ok(location);
        }

        let signature = source.signature();
        let target = match self.archetype_index.get(&(space, signature)) {
            Some(&id) => id,
            None => {
                let group = &self.groups[location.archetype.index()];
                let infos: ComponentInfos = group
                    .columns()
                    .iter()
                    .filter_map(|column| self.registry.info_by_id(column.type_id))
                    .collect();
                let capacity_per_chunk = group.capacity_per_chunk();
                self.create_entity_type(capacity_per_chunk, &infos, space)?
            }
        };

        let (source_group, target_group) =
            pair_mut(&mut self.groups, location.archetype.index(), target.index());
        let index = source_group.copy_slot_into(location.index, target_group);
        if let Some(moved) = source_group.erase(location.index) {
            if let Some(moved_location) = self.records[moved.entity.index() as usize]
                .location
                .as_mut()
            {
                moved_location.index = location.index;
            }
        }

        let new_location = EntityLocation {
            archetype: target,
            index,
        };
        self.records[entity.index() as usize].location = Some(new_location);
        Ok(new_location)
    }

    /// Give an entity the shared value `value`.
    ///
    /// Entities given equal values share a space: an existing space holding
    /// an equal `T` is reused, otherwise `value` is stored in a fresh space.
    /// Returns the space the entity now lives in.
    pub fn set_entity_shared_component<T: SharedComponent>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Space> {
        if !self.exists(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }

        let space = match self.shared.space_of(&value) {
            Some(space) => space,
            None => {
                let space = self.unused_space();
                self.shared.insert(space, value);
                space
            }
        };
        self.change_entity_space(entity, space)?;
        Ok(space)
    }

    /// Space above every space used by an archetype or a shared value
    fn unused_space(&self) -> Space {
        let archetypes = self.archetypes.iter().map(|archetype| archetype.space().0);
        let shared = self.shared.spaces().map(|space| space.0);
        archetypes
            .chain(shared)
            .max()
            .map_or(Space(0), |highest| Space(highest.saturating_add(1)))
    }

    // ========== Maintenance ==========

    /// Apply a command buffer, draining it
    pub fn flush_commands(&mut self, buffer: &mut CommandBuffer) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("manager.flush_commands", queued = buffer.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        buffer.apply(self)
    }

    /// Get memory usage statistics
    pub fn memory_stats(&self) -> MemoryStats {
        let chunk_count = self.groups.iter().map(ComponentGroup::num_chunks).sum();
        let allocated_bytes = self.groups.iter().map(ComponentGroup::allocated_bytes).sum();
        let live_bytes = self
            .groups
            .iter()
            .map(|group| group.len() * group.record_size())
            .sum();
        let directory_bytes = self.records.capacity() * std::mem::size_of::<EntityRecord>()
            + self.free_list.capacity() * std::mem::size_of::<u32>();

        MemoryStats {
            entity_count: self.live,
            archetype_count: self.archetypes.len(),
            chunk_count,
            allocated_bytes,
            live_bytes,
            directory_bytes,
            total_bytes: allocated_bytes + directory_bytes,
        }
    }

    fn expect_group(&self, archetype: ArchetypeId) -> usize {
        assert!(
            archetype.index() < self.groups.len(),
            "archetype {archetype} does not belong to this manager"
        );
        archetype.index()
    }

    fn expect_location(&self, entity: Entity) -> EntityLocation {
        match self.location(entity) {
            Some(location) => location,
            None => panic!("entity {entity} is not alive"),
        }
    }
}

/// The `Entity` column is written only by the manager.
#[inline]
fn assert_owned_entity_untouched<S: ComponentSet>() {
    assert!(
        !S::contains::<Entity>(),
        "the Entity component is owned by the EntityManager"
    );
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
