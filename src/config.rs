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

//! Store configuration

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkLayout;
use crate::component::ComponentInfo;
use crate::error::{EcsError, Result};

/// Default chunk size in bytes used to derive chunk capacities
pub const DEFAULT_CHUNK_BYTES: usize = 16 * 1024;

/// Runtime knobs of an [`EntityManager`](crate::manager::EntityManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Target chunk size for archetypes created from a chunk size
    pub default_chunk_bytes: usize,

    /// Directory records reserved up front
    pub initial_entity_capacity: usize,

    /// Archetype slots reserved up front
    pub initial_archetype_capacity: usize,

    /// Upper bound on directory size (live plus recycled handles)
    pub max_entities: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_chunk_bytes: DEFAULT_CHUNK_BYTES,
            initial_entity_capacity: 0,
            initial_archetype_capacity: 0,
            max_entities: u32::MAX,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_default_chunk_bytes(mut self, bytes: usize) -> Self {
        self.default_chunk_bytes = bytes;
        self
    }

    pub fn with_initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    pub fn with_initial_archetype_capacity(mut self, capacity: usize) -> Self {
        self.initial_archetype_capacity = capacity;
        self
    }

    pub fn with_max_entities(mut self, max_entities: u32) -> Self {
        self.max_entities = max_entities;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_bytes == 0 {
            return Err(EcsError::ConfigError(
                "default_chunk_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Entities of `component_infos` fitting into one default chunk, padding
    /// included, at least one
    pub fn capacity_for_chunk(&self, component_infos: &[ComponentInfo]) -> usize {
        ChunkLayout::fitting(component_infos, self.default_chunk_bytes).capacity_per_chunk()
    }
}
