//! Fixed-width archetype signature.
//! One bit per component type id; the width caps the number of distinct
//! component types a registry can hand out.

use std::fmt;

use serde::Serialize;

use crate::component::ComponentTypeId;

/// Number of distinct component types a signature can describe.
pub const MAX_COMPONENT_TYPES: usize = u64::BITS as usize;

/// Set of component type ids shared by every entity of an archetype.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArchetypeSignature(u64);

impl ArchetypeSignature {
    pub const EMPTY: Self = Self(0);

    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        let mut signature = Self::EMPTY;
        for id in ids {
            signature.insert(id);
        }
        signature
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Set the bit for `id`.
    ///
    /// # Panics
    /// Panics if `id` does not fit into the signature.
    pub fn insert(&mut self, id: ComponentTypeId) {
        let index = id.index();
        assert!(
            index < MAX_COMPONENT_TYPES,
            "component type id {index} exceeds the signature width of {MAX_COMPONENT_TYPES}"
        );
        self.0 |= 1 << index;
    }

    pub fn remove(&mut self, id: ComponentTypeId) {
        if id.index() < MAX_COMPONENT_TYPES {
            self.0 &= !(1 << id.index());
        }
    }

    #[inline]
    pub fn contains(self, id: ComponentTypeId) -> bool {
        id.index() < MAX_COMPONENT_TYPES && (self.0 & (1 << id.index())) != 0
    }

    /// True if every bit of `other` is also set here.
    #[inline]
    pub fn contains_all(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if this set shares any set bits with `other`.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns iterator over the component ids in the set
    pub fn ones(self) -> OnesIter {
        OnesIter { remaining: self.0 }
    }
}

impl FromIterator<ComponentTypeId> for ArchetypeSignature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl fmt::Debug for ArchetypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeSignature({:#066b})", self.0)
    }
}

pub struct OnesIter {
    remaining: u64,
}

impl Iterator for OnesIter {
    type Item = ComponentTypeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let trailing = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1; // Clear the bit we just found
        Some(ComponentTypeId(trailing as u16))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.count_ones() as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for OnesIter {}
