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

//! Chunk ECS - Archetype-based chunked component store
//!
//! Entities sharing a component set live in one archetype group. Each group
//! stores its components column by column in fixed-capacity chunks, keeps
//! live slots dense with swap-removal, and the entity manager maps handles to
//! their (archetype, slot) location. Shared components attach one value to
//! a whole space of archetypes.

pub mod archetype;
pub mod builtin;
pub mod chunk;
pub mod command;
pub mod component;
pub mod config;
pub mod debug;
pub mod entity;
pub mod error;
pub mod manager;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod query;
pub mod shared;
pub mod signature;
pub mod utils;


pub use archetype::*;
pub use chunk::*;
pub use command::*;
pub use component::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use manager::*;
pub use query::*;
pub use shared::*;
pub use signature::*;
