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

//! Command buffer for deferred structural changes
//!
//! Creation and destruction move slots around, so they cannot run while a
//! group's columns are borrowed. Queue them here and apply them afterwards.

use crate::component::{Component, ComponentSet};
use crate::entity::{ArchetypeId, Entity, Space};
use crate::error::Result;
use crate::manager::EntityManager;

/// Type alias for manager mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut EntityManager) -> Result<()> + Send>;

/// Deferred mutation of an [`EntityManager`]
pub enum Command {
    /// Create an entity and let the closure initialise it
    Create {
        archetype: ArchetypeId,
        init: Option<Box<dyn FnOnce(&mut EntityManager, Entity) + Send>>,
    },

    /// Destroy entity
    Destroy(Entity),

    /// Custom manager mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Create { archetype, .. } => {
                f.debug_struct("Create").field("archetype", archetype).finish()
            }
            Command::Destroy(e) => f.debug_tuple("Destroy").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue creation of a zero-initialised entity
    pub fn create(&mut self, archetype: ArchetypeId) {
        self.commands.push(Command::Create {
            archetype,
            init: None,
        });
    }

    /// Queue creation of an entity initialised with `values`
    ///
    /// # Panics
    /// Panics if `S` contains `Entity`: handles are assigned when the
    /// buffer is applied.
    pub fn create_with<S: ComponentSet>(&mut self, archetype: ArchetypeId, values: S) {
        assert!(
            !S::contains::<Entity>(),
            "the Entity component is owned by the EntityManager"
        );
        self.commands.push(Command::Create {
            archetype,
            init: Some(Box::new(move |manager, entity| {
                manager.set_components_data(entity, values);
            })),
        });
    }

    /// Queue destroy command
    pub fn destroy(&mut self, entity: Entity) {
        self.commands.push(Command::Destroy(entity));
    }

    /// Queue a write of one component
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.custom(move |manager| manager.try_set_component_data(entity, value));
    }

    /// Queue a move of `entity` into `space`
    pub fn change_space(&mut self, entity: Entity, space: Space) {
        self.custom(move |manager| manager.change_entity_space(entity, space).map(|_| ()));
    }

    /// Queue a custom manager mutation
    pub fn custom<F>(&mut self, f: F)
    where
        F: FnOnce(&mut EntityManager) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Apply all commands in queue order and clear the buffer.
    ///
    /// Stops at the first failing command; commands after it are dropped.
    pub fn apply(&mut self, manager: &mut EntityManager) -> Result<()> {
        for command in self.commands.drain(..) {
            match command {
                Command::Create { archetype, init } => {
                    let entity = manager.try_create_entity(archetype)?;
                    if let Some(init) = init {
                        init(manager, entity);
                    }
                }
                Command::Destroy(entity) => {
                    manager.destroy_entity(entity)?;
                }
                Command::Custom(f) => {
                    f(manager)?;
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::{EcsError, SpawnError};
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Health(u32);

    #[test]
    fn test_command_buffer() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.is_empty());

        buffer.destroy(Entity::new(0, 0));
        assert!(!buffer.is_empty());
        assert_eq!(buffer.len(), 1);

        buffer.clear();
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_apply_runs_in_order() {
        let mut manager = EntityManager::new();
        let archetype = manager.create_entity_type_of::<(Health,)>(2, Space(0)).unwrap();
        let doomed = manager.create_entity(archetype);

        let mut buffer = CommandBuffer::new();
        buffer.destroy(doomed);
        buffer.create_with(archetype, (Health(5),));
        buffer.apply(&mut manager).unwrap();

        assert!(buffer.is_empty());
        assert!(!manager.exists(doomed));
        // The destroyed index is recycled by the queued creation
        let created = Entity::new(doomed.index(), doomed.generation() + 1);
        assert_eq!(manager.get_component_data::<Health>(created), Health(5));
    }

    #[test]
    fn test_apply_reports_dead_entity() {
        let mut manager = EntityManager::new();
        let mut buffer = CommandBuffer::new();
        buffer.destroy(Entity::new(3, 0));
        assert_eq!(
            buffer.apply(&mut manager),
            Err(EcsError::EntityNotFound(Entity::new(3, 0)))
        );
    }

    #[test]
    fn test_apply_reports_unknown_archetype() {
        let mut manager = EntityManager::new();
        let mut buffer = CommandBuffer::new();
        buffer.create(ArchetypeId(2));
        assert_eq!(
            buffer.apply(&mut manager),
            Err(EcsError::ArchetypeNotFound(2))
        );
    }

    #[test]
    fn test_apply_reports_handle_exhaustion() {
        let config = StoreConfig::default().with_max_entities(1);
        let mut manager = EntityManager::with_config(config);
        let archetype = manager.create_entity_type_of::<(Health,)>(2, Space(0)).unwrap();

        let mut buffer = CommandBuffer::new();
        buffer.create(archetype);
        buffer.create_with(archetype, (Health(2),));
        assert_eq!(
            buffer.apply(&mut manager),
            Err(EcsError::SpawnError(SpawnError::EntityCapacityExhausted {
                attempted: 1,
                capacity: 0,
            }))
        );
        assert_eq!(manager.entity_count(), 1);
    }

    #[test]
    #[should_panic(expected = "owned by the EntityManager")]
    fn test_create_with_rejects_entity_values() {
        let mut buffer = CommandBuffer::new();
        buffer.create_with(ArchetypeId(0), (Entity::new(0, 0), Health(3)));
    }

    #[test]
    fn test_change_space_is_deferred() {
        let mut manager = EntityManager::new();
        let archetype = manager.create_entity_type_of::<(Health,)>(2, Space(0)).unwrap();
        let entity = manager.create_entity_with(archetype, (Health(8),));

        let mut buffer = CommandBuffer::new();
        buffer.change_space(entity, Space(4));
        assert_eq!(manager.archetype_of(entity), Some(archetype));

        manager.flush_commands(&mut buffer).unwrap();
        let moved_to = manager.archetype_of(entity).unwrap();
        assert_eq!(manager.archetype(moved_to).unwrap().space(), Space(4));
        assert_eq!(manager.get_component_data::<Health>(entity), Health(8));
    }
}
