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

//! Fixed-capacity chunks and their column-major layout
//!
//! A chunk holds `capacity_per_chunk` records laid out column by column:
//! every value of the first component, then every value of the second, and
//! so on. All reinterpretation between bytes and component values goes
//! through the conversion helpers at the bottom of this file.

use std::any::{type_name, TypeId};
use std::ops::Range;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::component::{
    Component, ComponentInfo, ComponentTypeId, ENTITY_COMPONENT_ID, MAX_SET_COMPONENTS,
};
use crate::entity::Entity;
use crate::utils::align_to;

/// Alignment guaranteed for the start of every chunk buffer.
pub const CHUNK_ALIGN: usize = std::mem::align_of::<u64>();

/// One page of component data.
///
/// Backed by `u64` words so column offsets aligned to at most
/// [`CHUNK_ALIGN`] are aligned in memory too.
pub struct Chunk {
    words: Box<[u64]>,
    len_bytes: usize,
}

impl Chunk {
    /// Allocate a zero-filled chunk of `len_bytes` bytes
    pub fn zeroed(len_bytes: usize) -> Self {
        Self {
            words: vec![0u64; len_bytes.div_ceil(CHUNK_ALIGN)].into_boxed_slice(),
            len_bytes,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len_bytes]
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len_bytes]
    }

    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }
}

/// Placement of one component column inside every chunk of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub type_id: ComponentTypeId,
    pub offset: usize,
    pub size: usize,
}

impl ColumnDescriptor {
    /// Byte range of the value at `slot` within a chunk
    #[inline]
    pub fn slot_range(&self, slot: usize) -> Range<usize> {
        let start = self.offset + slot * self.size;
        start..start + self.size
    }

    /// Byte range of the first `len` values within a chunk
    #[inline]
    pub fn column_range(&self, len: usize) -> Range<usize> {
        self.offset..self.offset + len * self.size
    }
}

/// Column layout shared by every chunk of one component group.
#[derive(Clone, Debug)]
pub struct ChunkLayout {
    columns: SmallVec<[ColumnDescriptor; MAX_SET_COMPONENTS]>,
    column_indices: FxHashMap<ComponentTypeId, usize>,
    /// Same columns keyed by Rust type, so typed access never locks the registry
    type_indices: FxHashMap<TypeId, usize>,
    capacity_per_chunk: usize,
    record_size: usize,
    chunk_bytes: usize,
}

impl ChunkLayout {
    /// Lay out `infos` in the given order.
    ///
    /// Each column starts where the previous one ends (its size times the
    /// chunk capacity), rounded up to the component's alignment. Repeated
    /// component types keep their first position.
    pub fn new(infos: &[ComponentInfo], capacity_per_chunk: usize) -> Self {
        assert!(
            capacity_per_chunk > 0,
            "chunk capacity must hold at least one entity"
        );

        let mut columns = SmallVec::new();
        let mut column_indices = FxHashMap::default();
        let mut type_indices = FxHashMap::default();
        let mut offset = 0;
        let mut record_size = 0;

        for info in infos {
            if column_indices.contains_key(&info.id) {
                continue;
            }
            offset = align_to(offset, info.align);
            column_indices.insert(info.id, columns.len());
            type_indices.insert(info.type_key, columns.len());
            columns.push(ColumnDescriptor {
                type_id: info.id,
                offset,
                size: info.size,
            });
            offset += info.size * capacity_per_chunk;
            record_size += info.size;
        }

        Self {
            columns,
            column_indices,
            type_indices,
            capacity_per_chunk,
            record_size,
            chunk_bytes: offset,
        }
    }

    /// Layout with the largest capacity whose chunks fit in `chunk_bytes`.
    ///
    /// Alignment padding between columns counts against the budget. The
    /// capacity never drops below one, even when a single record is larger
    /// than `chunk_bytes`.
    pub fn fitting(infos: &[ComponentInfo], chunk_bytes: usize) -> Self {
        let record_size = Self::new(infos, 1).record_size();
        let mut capacity = chunk_bytes
            .checked_div(record_size)
            .unwrap_or(chunk_bytes)
            .max(1);
        loop {
            let layout = Self::new(infos, capacity);
            if layout.chunk_bytes() <= chunk_bytes || capacity == 1 {
                return layout;
            }
            capacity -= 1;
        }
    }

    #[inline]
    pub fn column(&self, type_id: ComponentTypeId) -> Option<&ColumnDescriptor> {
        let index = *self.column_indices.get(&type_id)?;
        self.columns.get(index)
    }

    /// Column of component `T`, if the layout stores it
    #[inline]
    pub fn column_of<T: Component>(&self) -> Option<&ColumnDescriptor> {
        let index = *self.type_indices.get(&TypeId::of::<T>())?;
        self.columns.get(index)
    }

    #[inline]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    #[inline]
    pub fn capacity_per_chunk(&self) -> usize {
        self.capacity_per_chunk
    }

    /// Sum of all component sizes: the bytes one entity occupies
    #[inline]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    #[inline]
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Resolve `T` to its column, panicking if the layout lacks it.
    pub(crate) fn expect_column<T: Component>(&self) -> ColumnDescriptor {
        match self.column_of::<T>() {
            Some(column) => *column,
            None => panic!(
                "component {} is not part of this archetype",
                type_name::<T>()
            ),
        }
    }
}

/// Read-only view of one chunk's live slots.
#[derive(Clone, Copy)]
pub struct ChunkView<'a> {
    layout: &'a ChunkLayout,
    chunk: &'a Chunk,
    index: usize,
    len: usize,
}

impl<'a> ChunkView<'a> {
    pub(crate) fn new(
        layout: &'a ChunkLayout,
        chunk: &'a Chunk,
        index: usize,
        len: usize,
    ) -> Self {
        Self {
            layout,
            chunk,
            index,
            len,
        }
    }

    /// Position of this chunk in its group
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of live slots
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Typed column of `T` over the live slots.
    ///
    /// # Panics
    /// Panics if the archetype does not contain `T`.
    pub fn column<T: Component>(&self) -> &'a [T] {
        let column = self.layout.expect_column::<T>();
        cast_column(&self.chunk.bytes()[column.column_range(self.len)], self.len)
    }

    pub fn try_column<T: Component>(&self) -> Option<&'a [T]> {
        let column = self.layout.column_of::<T>()?;
        Some(cast_column(
            &self.chunk.bytes()[column.column_range(self.len)],
            self.len,
        ))
    }

    /// Owner of every live slot, parallel to the component columns
    pub fn entities(&self) -> &'a [Entity] {
        self.column::<Entity>()
    }
}

/// Mutable view of one chunk's live slots.
///
/// The `Entity` column stays read-only: it is what the directory relies on
/// to patch locations after a swap-remove.
pub struct ChunkViewMut<'a> {
    layout: &'a ChunkLayout,
    chunk: &'a mut Chunk,
    index: usize,
    len: usize,
}

impl<'a> ChunkViewMut<'a> {
    pub(crate) fn new(
        layout: &'a ChunkLayout,
        chunk: &'a mut Chunk,
        index: usize,
        len: usize,
    ) -> Self {
        Self {
            layout,
            chunk,
            index,
            len,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column<T: Component>(&self) -> &[T] {
        let column = self.layout.expect_column::<T>();
        cast_column(&self.chunk.bytes()[column.column_range(self.len)], self.len)
    }

    pub fn entities(&self) -> &[Entity] {
        self.column::<Entity>()
    }

    /// Mutable typed column of `T` over the live slots.
    ///
    /// # Panics
    /// Panics if the archetype does not contain `T` or `T` is `Entity`.
    pub fn column_mut<T: Component>(&mut self) -> &mut [T] {
        let column = self.writable_column::<T>();
        let len = self.len;
        cast_column_mut(&mut self.chunk.bytes_mut()[column.column_range(len)], len)
    }

    /// Consume the view, keeping the mutable column for the full borrow.
    pub fn into_column_mut<T: Component>(self) -> &'a mut [T] {
        let column = self.writable_column::<T>();
        let len = self.len;
        cast_column_mut(&mut self.chunk.bytes_mut()[column.column_range(len)], len)
    }

    /// Two distinct mutable columns at once.
    pub fn column_pair_mut<A: Component, B: Component>(&mut self) -> (&mut [A], &mut [B]) {
        let a = self.writable_column::<A>();
        let b = self.writable_column::<B>();
        assert_ne!(
            a.type_id, b.type_id,
            "column_pair_mut requires two different components"
        );

        let len = self.len;
        let range_a = a.column_range(len);
        let range_b = b.column_range(len);
        let bytes = self.chunk.bytes_mut();

        // Columns never overlap, so splitting at the later start separates them
        if range_a.start < range_b.start {
            let (low, high) = bytes.split_at_mut(range_b.start);
            (
                cast_column_mut(&mut low[range_a], len),
                cast_column_mut(&mut high[..range_b.len()], len),
            )
        } else {
            let (low, high) = bytes.split_at_mut(range_a.start);
            (
                cast_column_mut(&mut high[..range_a.len()], len),
                cast_column_mut(&mut low[range_b], len),
            )
        }
    }

    fn writable_column<T: Component>(&self) -> ColumnDescriptor {
        let column = self.layout.expect_column::<T>();
        assert_ne!(
            column.type_id, ENTITY_COMPONENT_ID,
            "the Entity column cannot be borrowed mutably"
        );
        column
    }
}

/// Decode one value from its slot bytes.
#[inline]
pub(crate) fn read_value<T: Component>(bytes: &[u8]) -> T {
    bytemuck::pod_read_unaligned(bytes)
}

/// Encode one value into its slot bytes.
#[inline]
pub(crate) fn write_value<T: Component>(bytes: &mut [u8], value: &T) {
    bytes.copy_from_slice(bytemuck::bytes_of(value));
}

/// Reinterpret an aligned column byte range as `len` values of `T`.
pub(crate) fn cast_column<T: Component>(bytes: &[u8], len: usize) -> &[T] {
    if std::mem::size_of::<T>() == 0 {
        // SAFETY: zero-sized values occupy no memory; a dangling, aligned
        // pointer is valid for any length.
        return unsafe { std::slice::from_raw_parts(NonNull::<T>::dangling().as_ptr(), len) };
    }
    bytemuck::cast_slice(bytes)
}

pub(crate) fn cast_column_mut<T: Component>(bytes: &mut [u8], len: usize) -> &mut [T] {
    if std::mem::size_of::<T>() == 0 {
        // SAFETY: see `cast_column`
        return unsafe {
            std::slice::from_raw_parts_mut(NonNull::<T>::dangling().as_ptr(), len)
        };
    }
    bytemuck::cast_slice_mut(bytes)
}
