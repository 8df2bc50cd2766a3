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

//! Error types
//!
//! Hot-path storage operations treat misuse as a programming error and panic.
//! The variants below cover the cold paths that report failures to the caller.

use std::fmt;

use crate::entity::Entity;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity handle is dead or stale
    EntityNotFound(Entity),

    /// Component is not part of the entity's archetype
    ComponentNotFound(&'static str),

    /// Archetype id was never issued by this manager
    ArchetypeNotFound(usize),

    /// Archetype component list lacks the built-in `Entity` component
    MissingEntityComponent,

    /// Chunk capacity of zero entities
    InvalidChunkCapacity,

    /// Configuration could not be parsed
    ConfigError(String),

    /// Spawn error with detailed context
    SpawnError(SpawnError),
}

/// Detailed spawn error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// Entity handle space exhausted
    EntityCapacityExhausted { attempted: usize, capacity: usize },
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::EntityCapacityExhausted {
                attempted,
                capacity,
            } => {
                write!(
                    f,
                    "Entity capacity exhausted: attempted to create {attempted}, max is {capacity}"
                )
            }
        }
    }
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound(entity) => write!(f, "Entity not found: {entity}"),
            EcsError::ComponentNotFound(name) => write!(f, "Component not found: {name}"),
            EcsError::ArchetypeNotFound(id) => write!(f, "Archetype not found: {id}"),
            EcsError::MissingEntityComponent => {
                write!(f, "Archetype must include the Entity component")
            }
            EcsError::InvalidChunkCapacity => {
                write!(f, "Chunk capacity must hold at least one entity")
            }
            EcsError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            EcsError::SpawnError(spawn_err) => write!(f, "Spawn error: {spawn_err}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<SpawnError> for EcsError {
    fn from(err: SpawnError) -> Self {
        EcsError::SpawnError(err)
    }
}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::ConfigError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
