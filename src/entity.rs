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

//! Entity handles and location metadata.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Opaque entity handle.
///
/// `index` addresses the manager's directory and is recycled after the
/// entity is destroyed. `generation` is bumped on every destroy so a handle
/// kept across a destroy boundary no longer reports as alive.
///
/// Every archetype stores its entities' handles in an `Entity` column, which
/// is how swap-remove recovers the owner of a moved slot.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable,
    Serialize, Deserialize,
)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Directory slot of this handle.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Identifier of an archetype group inside one `EntityManager`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArchetypeId(pub(crate) usize);

impl ArchetypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace tag separating archetypes with identical component sets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Space(pub u32);

/// Entity location in a component group (archetype, slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype: ArchetypeId,
    pub index: usize,
}
