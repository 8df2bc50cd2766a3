use chunk_ecs::prelude::*;
use std::time::Instant;

#[cfg(feature = "profiling")]
use std::fs::File;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Health(u32);

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(manager))]
fn profile_creates(manager: &mut EntityManager, archetype: ArchetypeId, count: usize) {
    let _span = tracing::info_span!("create_loop", count = count).entered();
    for i in 0..count {
        if i % 1_000 == 0 {
            tracing::info!("Creating entity {}/{}", i, count);
        }
        manager.create_entity_with(
            archetype,
            (
                LocalPosition::new(1.0, 2.0, 3.0),
                LocalRotation::IDENTITY,
                Health(100),
            ),
        );
    }
}

#[cfg(feature = "profiling")]
fn main() -> Result<()> {
    // Set up tracing subscriber to write to a file
    let file = File::create("trace.log").map_err(|err| EcsError::ConfigError(err.to_string()))?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut manager = EntityManager::new();
    let archetype = manager
        .create_entity_type_for_chunk_size::<(LocalPosition, LocalRotation, Health)>(Space(0))?;

    println!("Warming up...");
    {
        let _span = tracing::info_span!("warmup").entered();
        manager.create_entities(1_000, archetype)?;
    }

    println!("Profiling creation with 3 components...");
    let start = Instant::now();
    profile_creates(&mut manager, archetype, 10_000);
    println!("Create 10k entities complete in: {:?}", start.elapsed());

    let doomed: Vec<Entity> = manager
        .component_group(archetype)
        .map(|group| group.chunks().flat_map(|chunk| chunk.entities().to_vec()).step_by(2).collect())
        .unwrap_or_default();
    let start = Instant::now();
    manager.destroy_entities(&doomed)?;
    println!("Destroy {} entities complete in: {:?}", doomed.len(), start.elapsed());

    StoreInspector::print_summary(&manager);
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() -> Result<()> {
    let mut manager = EntityManager::new();
    let archetype = manager
        .create_entity_type_for_chunk_size::<(LocalPosition, LocalRotation, Health)>(Space(0))?;

    let start = Instant::now();
    manager.create_entities(10_000, archetype)?;
    println!("Create 10k entities complete in: {:?}", start.elapsed());
    println!("Run with --features profiling to record a trace");
    Ok(())
}
