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

//! Archetype storage: chunked component groups with slot allocation and
//! swap-removal

use std::sync::Arc;

use serde::Serialize;

use crate::chunk::{
    read_value, write_value, Chunk, ChunkLayout, ChunkView, ChunkViewMut, ColumnDescriptor,
};
use crate::component::{
    Component, ComponentInfo, ComponentRegistry, ComponentSet, ENTITY_COMPONENT_ID,
};
use crate::entity::{ArchetypeId, Entity, Space};
use crate::signature::ArchetypeSignature;
use crate::utils::chunks_needed;

/// Identity of one archetype group inside an `EntityManager`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Archetype {
    id: ArchetypeId,
    space: Space,
    signature: ArchetypeSignature,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, space: Space, signature: ArchetypeSignature) -> Self {
        Self {
            id,
            space,
            signature,
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn signature(&self) -> ArchetypeSignature {
        self.signature
    }
}

/// Entity whose data was moved by a swap-remove.
///
/// Its directory record must be pointed at the erased index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementMoved {
    pub entity: Entity,
}

/// Storage for every entity of one archetype.
///
/// Slots `[0, len)` are live and dense. Slot `i` lives in chunk
/// `i / capacity_per_chunk` at position `i % capacity_per_chunk`.
pub struct ComponentGroup {
    registry: Arc<ComponentRegistry>,
    signature: ArchetypeSignature,
    layout: ChunkLayout,
    chunks: Vec<Chunk>,
    len: usize,
}

impl ComponentGroup {
    /// Create an empty group using the global registry.
    ///
    /// # Panics
    /// Panics if `capacity_per_chunk` is zero or `component_infos` lacks the
    /// `Entity` component.
    pub fn new(component_infos: &[ComponentInfo], capacity_per_chunk: usize) -> Self {
        Self::with_registry(
            Arc::clone(ComponentRegistry::global()),
            component_infos,
            capacity_per_chunk,
        )
    }

    pub fn with_registry(
        registry: Arc<ComponentRegistry>,
        component_infos: &[ComponentInfo],
        capacity_per_chunk: usize,
    ) -> Self {
        let layout = ChunkLayout::new(component_infos, capacity_per_chunk);
        assert!(
            layout.column(ENTITY_COMPONENT_ID).is_some(),
            "component group must include the Entity component"
        );
        let signature = layout.columns().iter().map(|c| c.type_id).collect();

        Self {
            registry,
            signature,
            layout,
            chunks: Vec::new(),
            len: 0,
        }
    }

    /// Group storing the components of `S` (which must list `Entity`).
    pub fn of<S: ComponentSet>(capacity_per_chunk: usize) -> Self {
        let registry = ComponentRegistry::global();
        Self::with_registry(
            Arc::clone(registry),
            &S::component_infos(registry),
            capacity_per_chunk,
        )
    }

    /// Number of live entities
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.layout.capacity_per_chunk()
    }

    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn capacity_per_chunk(&self) -> usize {
        self.layout.capacity_per_chunk()
    }

    #[inline]
    pub fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    #[inline]
    pub fn chunk_bytes(&self) -> usize {
        self.layout.chunk_bytes()
    }

    #[inline]
    pub fn signature(&self) -> ArchetypeSignature {
        self.signature
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.layout.columns()
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Check if the group stores component `T`
    pub fn has_component<T: Component>(&self) -> bool {
        self.layout.column_of::<T>().is_some()
    }

    /// Append zeroed chunks until `capacity() >= new_capacity`.
    pub fn reserve(&mut self, new_capacity: usize) {
        let needed = chunks_needed(new_capacity, self.layout.capacity_per_chunk());
        if needed <= self.chunks.len() {
            return;
        }

        #[cfg(feature = "profiling")]
        tracing::trace!(
            from = self.chunks.len(),
            to = needed,
            chunk_bytes = self.layout.chunk_bytes(),
            "allocating chunks"
        );

        self.chunks.reserve(needed - self.chunks.len());
        while self.chunks.len() < needed {
            self.chunks.push(Chunk::zeroed(self.layout.chunk_bytes()));
        }
    }

    /// Drop trailing chunks that hold no live slot.
    pub fn shrink_to_fit(&mut self) {
        let needed = chunks_needed(self.len, self.layout.capacity_per_chunk());
        self.chunks.truncate(needed);
        self.chunks.shrink_to_fit();
    }

    /// Allocate a zeroed slot at the end, growing by one chunk when full.
    pub fn push_back(&mut self) -> usize {
        if self.len == self.capacity() {
            self.reserve(self.capacity() + self.layout.capacity_per_chunk());
        }

        let index = self.len;
        self.len += 1;
        self.zero_slot(index);
        index
    }

    /// Allocate a slot and write `values` into it
    pub fn push_back_with<S: ComponentSet>(&mut self, values: S) -> usize {
        let index = self.push_back();
        values.write_to(self, index);
        index
    }

    /// Remove the last slot.
    ///
    /// # Panics
    /// Panics if the group is empty.
    pub fn pop_back(&mut self) {
        assert!(self.len > 0, "pop_back on an empty component group");
        self.len -= 1;
    }

    /// Forget every live slot, keeping allocated chunks.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Components of the last live slot
    pub fn back<S: ComponentSet>(&self) -> S {
        assert!(self.len > 0, "back on an empty component group");
        S::read_from(self, self.len - 1)
    }

    /// Remove slot `index`, keeping storage dense.
    ///
    /// When `index` is not the last slot the tail's data is copied into it and
    /// the tail's owner is returned so its directory record can be patched.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) -> Option<ElementMoved> {
        assert!(
            index < self.len,
            "erase index {index} out of bounds for a group of {} entities",
            self.len
        );

        let last = self.len - 1;
        if index == last {
            self.len = last;
            return None;
        }

        // Read the owner before its slot is copied over
        let entity = self.get_component_data::<Entity>(last);
        self.copy_slot(last, index);
        self.len = last;

        Some(ElementMoved { entity })
    }

    /// Append a copy of slot `index` to `destination`, returning its new index.
    ///
    /// Columns are matched by component id; columns `destination` lacks are
    /// skipped and the ones it adds stay zeroed. Both groups must come from
    /// the same registry.
    pub(crate) fn copy_slot_into(&self, index: usize, destination: &mut ComponentGroup) -> usize {
        debug_assert!(index < self.len, "slot {index} is not live");
        let new_index = destination.push_back();
        let (from_chunk, from_slot) = self.locate(index);
        let (to_chunk, to_slot) = destination.locate(new_index);

        let source = self.chunks[from_chunk].bytes();
        let target = destination.chunks[to_chunk].bytes_mut();
        for column in self.layout.columns() {
            if let Some(to_column) = destination.layout.column(column.type_id) {
                target[to_column.slot_range(to_slot)]
                    .copy_from_slice(&source[column.slot_range(from_slot)]);
            }
        }
        new_index
    }

    /// Read component `T` of slot `index`.
    ///
    /// # Panics
    /// Panics if the group does not store `T`.
    pub fn get_component_data<T: Component>(&self, index: usize) -> T {
        debug_assert!(index < self.len, "slot {index} is not live");
        let column = self.layout.expect_column::<T>();
        let (chunk, slot) = self.locate(index);
        read_value(&self.chunks[chunk].bytes()[column.slot_range(slot)])
    }

    /// Write component `T` of slot `index`.
    ///
    /// # Panics
    /// Panics if the group does not store `T`.
    pub fn set_component_data<T: Component>(&mut self, index: usize, value: T) {
        debug_assert!(index < self.len, "slot {index} is not live");
        let column = self.layout.expect_column::<T>();
        let (chunk, slot) = self.locate(index);
        write_value(
            &mut self.chunks[chunk].bytes_mut()[column.slot_range(slot)],
            &value,
        );
    }

    pub fn get_components_data<S: ComponentSet>(&self, index: usize) -> S {
        S::read_from(self, index)
    }

    pub fn set_components_data<S: ComponentSet>(&mut self, index: usize, values: S) {
        values.write_to(self, index);
    }

    /// Number of live slots in chunk `chunk_index`
    #[inline]
    pub fn chunk_len(&self, chunk_index: usize) -> usize {
        live_len(self.len, self.layout.capacity_per_chunk(), chunk_index)
    }

    /// Column of `T` over the live slots of one chunk
    pub fn components<T: Component>(&self, chunk_index: usize) -> &[T] {
        self.chunk(chunk_index).column::<T>()
    }

    pub fn components_mut<T: Component>(&mut self, chunk_index: usize) -> &mut [T] {
        self.chunk_mut(chunk_index).into_column_mut::<T>()
    }

    pub fn chunk(&self, chunk_index: usize) -> ChunkView<'_> {
        ChunkView::new(
            &self.layout,
            &self.chunks[chunk_index],
            chunk_index,
            self.chunk_len(chunk_index),
        )
    }

    pub fn chunk_mut(&mut self, chunk_index: usize) -> ChunkViewMut<'_> {
        let len = self.chunk_len(chunk_index);
        ChunkViewMut::new(
            &self.layout,
            &mut self.chunks[chunk_index],
            chunk_index,
            len,
        )
    }

    /// Views over every chunk, including reserved chunks with no live slot
    pub fn chunks(&self) -> impl Iterator<Item = ChunkView<'_>> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .map(move |(index, chunk)| {
                ChunkView::new(
                    &self.layout,
                    chunk,
                    index,
                    self.chunk_len(index),
                )
            })
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = ChunkViewMut<'_>> + '_ {
        let layout = &self.layout;
        let len = self.len;
        self.chunks
            .iter_mut()
            .enumerate()
            .map(move |(index, chunk)| {
                let chunk_len = live_len(len, layout.capacity_per_chunk(), index);
                ChunkViewMut::new(layout, chunk, index, chunk_len)
            })
    }

    /// Visit every chunk on the rayon pool.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk<F>(&self, f: F)
    where
        F: Fn(ChunkView<'_>) + Send + Sync,
    {
        use rayon::prelude::*;

        let layout = &self.layout;
        let len = self.len;
        self.chunks
            .par_iter()
            .enumerate()
            .for_each(|(index, chunk)| {
                let chunk_len = live_len(len, layout.capacity_per_chunk(), index);
                f(ChunkView::new(layout, chunk, index, chunk_len));
            });
    }

    /// Visit every chunk mutably on the rayon pool.
    ///
    /// Chunks are disjoint buffers, so each worker owns its chunk outright.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk_mut<F>(&mut self, f: F)
    where
        F: Fn(ChunkViewMut<'_>) + Send + Sync,
    {
        use rayon::prelude::*;

        let layout = &self.layout;
        let len = self.len;
        self.chunks
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, chunk)| {
                let chunk_len = live_len(len, layout.capacity_per_chunk(), index);
                f(ChunkViewMut::new(layout, chunk, index, chunk_len));
            });
    }

    /// Heap bytes held by chunk buffers
    pub fn allocated_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::len_bytes).sum()
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        let capacity_per_chunk = self.layout.capacity_per_chunk();
        (index / capacity_per_chunk, index % capacity_per_chunk)
    }

    fn zero_slot(&mut self, index: usize) {
        let (chunk, slot) = self.locate(index);
        let bytes = self.chunks[chunk].bytes_mut();
        for column in self.layout.columns() {
            bytes[column.slot_range(slot)].fill(0);
        }
    }

    /// Copy every column of slot `from` over slot `to` (`to < from`).
    fn copy_slot(&mut self, from: usize, to: usize) {
        debug_assert!(to < from);
        let (from_chunk, from_slot) = self.locate(from);
        let (to_chunk, to_slot) = self.locate(to);

        if from_chunk == to_chunk {
            let bytes = self.chunks[to_chunk].bytes_mut();
            for column in self.layout.columns() {
                bytes.copy_within(column.slot_range(from_slot), column.slot_range(to_slot).start);
            }
        } else {
            let (low, high) = self.chunks.split_at_mut(from_chunk);
            let destination = low[to_chunk].bytes_mut();
            let source = high[0].bytes();
            for column in self.layout.columns() {
                destination[column.slot_range(to_slot)]
                    .copy_from_slice(&source[column.slot_range(from_slot)]);
            }
        }
    }
}

#[inline]
fn live_len(len: usize, capacity_per_chunk: usize, chunk_index: usize) -> usize {
    len.saturating_sub(chunk_index * capacity_per_chunk)
        .min(capacity_per_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Rotation {
        a: f32,
        b: f32,
        c: f32,
        w: f32,
    }

    fn position(v: f32) -> Position {
        Position { x: v, y: v + 1.0, z: v + 2.0 }
    }

    fn group_with(count: u32, capacity_per_chunk: usize) -> ComponentGroup {
        let mut group = ComponentGroup::of::<(Entity, Position)>(capacity_per_chunk);
        for i in 0..count {
            group.push_back_with((Entity::new(i, 0), position(i as f32)));
        }
        group
    }

    #[test]
    fn test_new_group_is_empty() {
        let group = ComponentGroup::of::<(Entity, Position, Rotation)>(2);
        assert_eq!(group.len(), 0);
        assert_eq!(group.capacity(), 0);
        assert_eq!(group.num_chunks(), 0);
        assert_eq!(group.record_size(), 8 + 12 + 16);
    }

    #[test]
    fn test_push_back_returns_sequential_indices() {
        let mut group = ComponentGroup::of::<(Entity, Position)>(2);
        assert_eq!(group.push_back(), 0);
        assert_eq!(group.push_back(), 1);
        assert_eq!(group.num_chunks(), 1);
        assert_eq!(group.push_back(), 2);
        assert_eq!(group.num_chunks(), 2);
        assert_eq!(group.capacity(), 4);
    }

    #[test]
    fn test_reserve_is_idempotent() {
        let mut group = ComponentGroup::of::<(Entity, Position)>(2);
        group.reserve(3);
        assert_eq!(group.capacity(), 4);
        group.reserve(3);
        group.reserve(1);
        assert_eq!(group.capacity(), 4);
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn test_shrink_to_fit_keeps_live_chunks() {
        let mut group = ComponentGroup::of::<(Entity, Position)>(2);
        group.reserve(3);
        group.push_back();
        group.shrink_to_fit();
        assert_eq!(group.len(), 1);
        assert_eq!(group.capacity(), 2);

        group.pop_back();
        group.shrink_to_fit();
        assert_eq!(group.capacity(), 0);
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut group = ComponentGroup::of::<(Entity, Position, Rotation)>(2);
        let index = group.push_back_with((
            Entity::new(1, 0),
            position(2.0),
            Rotation { a: 0.1, b: 0.2, c: 0.3, w: 1.0 },
        ));

        let rotation = Rotation { a: 1.0, b: 2.0, c: 3.0, w: 4.0 };
        group.set_component_data(index, rotation);
        assert_eq!(group.get_component_data::<Rotation>(index), rotation);
        assert_eq!(group.get_component_data::<Position>(index), position(2.0));

        let (entity, pos) = group.get_components_data::<(Entity, Position)>(index);
        assert_eq!(entity, Entity::new(1, 0));
        assert_eq!(pos, position(2.0));
    }

    #[test]
    fn test_back_and_pop_back() {
        let mut group = group_with(2, 2);
        let (entity, pos) = group.back::<(Entity, Position)>();
        assert_eq!(entity, Entity::new(1, 0));
        assert_eq!(pos, position(1.0));
        group.pop_back();
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_push_back_zeroes_reused_slot() {
        let mut group = group_with(2, 4);
        group.pop_back();
        let index = group.push_back();
        assert_eq!(index, 1);
        assert_eq!(group.get_component_data::<Position>(index), Position::default());
    }

    #[test]
    fn test_erase_tail_moves_nothing() {
        let mut group = group_with(3, 2);
        assert_eq!(group.erase(2), None);
        assert_eq!(group.len(), 2);
        assert_eq!(group.get_component_data::<Entity>(0), Entity::new(0, 0));
        assert_eq!(group.get_component_data::<Entity>(1), Entity::new(1, 0));
    }

    #[test]
    fn test_erase_middle_swaps_tail_in() {
        let mut group = group_with(3, 2);
        let moved = group.erase(0);
        assert_eq!(moved, Some(ElementMoved { entity: Entity::new(2, 0) }));
        assert_eq!(group.len(), 2);
        assert_eq!(group.get_component_data::<Entity>(0), Entity::new(2, 0));
        assert_eq!(group.get_component_data::<Position>(0), position(2.0));
        assert_eq!(group.get_component_data::<Entity>(1), Entity::new(1, 0));
        assert_eq!(group.get_component_data::<Position>(1), position(1.0));
    }

    #[test]
    fn test_erase_within_one_chunk() {
        let mut group = group_with(3, 8);
        let moved = group.erase(1);
        assert_eq!(moved.map(|m| m.entity), Some(Entity::new(2, 0)));
        assert_eq!(group.get_component_data::<Position>(1), position(2.0));
    }

    #[test]
    fn test_erase_single_slot() {
        let mut group = group_with(1, 2);
        assert_eq!(group.erase(0), None);
        assert!(group.is_empty());
    }

    #[test]
    fn test_erase_two_slots() {
        let mut group = group_with(2, 2);
        let first = group.erase(0);
        let second = group.erase(0);
        assert_eq!(first.map(|m| m.entity), Some(Entity::new(1, 0)));
        assert_eq!(second, None);
        assert!(group.is_empty());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_erase_on_empty_group_panics() {
        let mut group = ComponentGroup::of::<(Entity, Position)>(2);
        group.erase(0);
    }

    #[test]
    fn test_component_views_follow_chunk_lengths() {
        let group = group_with(3, 2);
        assert_eq!(group.components::<Position>(0).len(), 2);
        assert_eq!(group.components::<Position>(1).len(), 1);
        assert_eq!(group.components::<Position>(1)[0], position(2.0));
        assert_eq!(group.components::<Entity>(0)[1], Entity::new(1, 0));
    }

    #[test]
    fn test_components_mut_writes_through() {
        let mut group = group_with(3, 2);
        for chunk_index in 0..group.num_chunks() {
            for pos in group.components_mut::<Position>(chunk_index) {
                pos.x = -1.0;
            }
        }
        assert!((0..3).all(|i| group.get_component_data::<Position>(i).x == -1.0));
    }

    #[test]
    fn test_reserved_chunks_are_empty_views() {
        let mut group = group_with(1, 2);
        group.reserve(6);
        let lengths: Vec<_> = group.chunks().map(|chunk| chunk.len()).collect();
        assert_eq!(lengths, vec![1, 0, 0]);
    }

    #[test]
    fn test_typed_access_leaves_registry_untouched() {
        #[repr(C)]
        #[derive(Clone, Copy, Pod, Zeroable)]
        struct Unused(u32);

        let registry = Arc::new(ComponentRegistry::new());
        let infos = [registry.info::<Entity>(), registry.info::<Position>()];
        let mut group = ComponentGroup::with_registry(Arc::clone(&registry), &infos, 2);
        group.push_back_with((Entity::new(0, 0), position(1.0)));
        let registered = registry.len();

        assert_eq!(group.get_component_data::<Position>(0), position(1.0));
        assert!(!group.has_component::<Unused>());
        assert!(group.chunk(0).try_column::<Unused>().is_none());
        assert_eq!(registry.len(), registered);
    }

    #[test]
    fn test_copy_slot_into_matches_columns_by_id() {
        let mut source = group_with(3, 2);
        let mut destination = ComponentGroup::of::<(Position, Entity, Rotation)>(4);

        let index = source.copy_slot_into(1, &mut destination);
        assert_eq!(index, 0);
        assert_eq!(destination.get_component_data::<Entity>(0), Entity::new(1, 0));
        assert_eq!(destination.get_component_data::<Position>(0), position(1.0));
        assert_eq!(destination.get_component_data::<Rotation>(0), Rotation::default());

        source.erase(1);
        assert_eq!(source.get_component_data::<Entity>(1), Entity::new(2, 0));
    }

    #[test]
    fn test_has_component() {
        let group = ComponentGroup::of::<(Entity, Position)>(2);
        assert!(group.has_component::<Position>());
        assert!(group.has_component::<Entity>());
        assert!(!group.has_component::<Rotation>());
    }

    #[test]
    #[should_panic(expected = "must include the Entity component")]
    fn test_group_without_entity_rejected() {
        ComponentGroup::of::<(Position,)>(2);
    }

    #[test]
    #[should_panic(expected = "is not part of this archetype")]
    fn test_missing_component_access_panics() {
        let group = group_with(1, 2);
        group.get_component_data::<Rotation>(0);
    }
}
