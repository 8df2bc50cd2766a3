//! Store diagnostics

use serde::Serialize;

use crate::entity::Entity;
use crate::error::Result;
use crate::manager::EntityManager;

/// Store inspector for debugging
pub struct StoreInspector;

impl StoreInspector {
    pub fn entity_count(manager: &EntityManager) -> usize {
        manager.entity_count()
    }

    /// Get archetype summary
    pub fn archetype_summary(manager: &EntityManager) -> Vec<ArchetypeInfo> {
        let registry = manager.registry();

        manager
            .archetypes()
            .iter()
            .zip(manager.component_groups())
            .map(|(archetype, group)| ArchetypeInfo {
                id: archetype.id().index(),
                space: archetype.space().0,
                components: archetype
                    .signature()
                    .ones()
                    .map(|id| registry.name_of(id).unwrap_or("<unregistered>").to_string())
                    .collect(),
                entity_count: group.len(),
                capacity: group.capacity(),
                chunk_count: group.num_chunks(),
                capacity_per_chunk: group.capacity_per_chunk(),
                record_size: group.record_size(),
            })
            .collect()
    }

    /// Archetype summary and memory statistics as pretty JSON
    pub fn to_json(manager: &EntityManager) -> Result<String> {
        #[derive(Serialize)]
        struct Report {
            memory: MemoryStats,
            archetypes: Vec<ArchetypeInfo>,
        }

        let report = Report {
            memory: manager.memory_stats(),
            archetypes: Self::archetype_summary(manager),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    /// Print store summary to console
    pub fn print_summary(manager: &EntityManager) {
        let stats = manager.memory_stats();
        println!("=== Store Summary ===");
        println!("Entities: {}", stats.entity_count);
        println!("Archetypes: {}", stats.archetype_count);
        println!(
            "Chunks: {} ({} bytes allocated, {} live)",
            stats.chunk_count, stats.allocated_bytes, stats.live_bytes
        );

        println!("\n=== Archetypes ===");
        for info in Self::archetype_summary(manager) {
            println!(
                "Archetype {} (space {}): {} entities in {} chunks of {}, components [{}]",
                info.id,
                info.space,
                info.entity_count,
                info.chunk_count,
                info.capacity_per_chunk,
                info.components.join(", ")
            );
        }
    }

    /// Print entity details
    pub fn print_entity(manager: &EntityManager, entity: Entity) {
        if let Some(location) = manager.location(entity) {
            println!("=== Entity {entity} ===");
            println!("Archetype: {}", location.archetype);
            println!("Index: {}", location.index);

            if let Some(archetype) = manager.archetype(location.archetype) {
                println!("Components: {} types", archetype.signature().len());
            }
        } else {
            println!("Entity {entity} not found");
        }
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug, Serialize)]
pub struct ArchetypeInfo {
    pub id: usize,
    pub space: u32,
    pub components: Vec<String>,
    pub entity_count: usize,
    pub capacity: usize,
    pub chunk_count: usize,
    pub capacity_per_chunk: usize,
    pub record_size: usize,
}

/// Memory usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub entity_count: usize,
    pub archetype_count: usize,
    pub chunk_count: usize,
    /// Bytes held by chunk buffers
    pub allocated_bytes: usize,
    /// Bytes occupied by live records
    pub live_bytes: usize,
    /// Bytes held by the entity directory and free list
    pub directory_bytes: usize,
    pub total_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Space;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Pod, Zeroable)]
    struct Mana(u32);

    #[test]
    fn test_archetype_summary() {
        let mut manager = EntityManager::new();
        let archetype = manager.create_entity_type_of::<(Mana,)>(2, Space(3)).unwrap();
        manager.create_entities(3, archetype).unwrap();

        let summary = StoreInspector::archetype_summary(&manager);
        assert_eq!(summary.len(), 1);
        let info = &summary[0];
        assert_eq!(info.space, 3);
        assert_eq!(info.entity_count, 3);
        assert_eq!(info.capacity, 4);
        assert_eq!(info.chunk_count, 2);
        assert_eq!(info.components.len(), 2);
        assert!(info.components.iter().any(|name| name.ends_with("Mana")));
    }

    #[test]
    fn test_to_json() {
        let mut manager = EntityManager::new();
        let archetype = manager.create_entity_type_of::<(Mana,)>(2, Space(0)).unwrap();
        manager.create_entity(archetype);

        let json = StoreInspector::to_json(&manager).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["memory"]["entity_count"], 1);
        assert_eq!(value["archetypes"][0]["record_size"], 12);
    }
}
