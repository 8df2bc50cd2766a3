//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use chunk_ecs::prelude::*;
//! ```

pub use crate::archetype::{Archetype, ComponentGroup, ElementMoved};
pub use crate::builtin::{LocalPosition, LocalRotation};
pub use crate::chunk::{ChunkView, ChunkViewMut};
pub use crate::command::CommandBuffer;
pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentSet};
pub use crate::config::StoreConfig;
pub use crate::debug::{MemoryStats, StoreInspector};
pub use crate::entity::{ArchetypeId, Entity, EntityLocation, Space};
pub use crate::error::{EcsError, Result, SpawnError};
pub use crate::manager::EntityManager;
pub use crate::query::ArchetypeFilter;
pub use crate::shared::{SharedComponent, SharedComponents};
pub use crate::signature::ArchetypeSignature;
pub use bytemuck::{Pod, Zeroable};
