//! Whole-cache and lock maintenance commands
use super::Outcome;
use shmcache::{CacheBackend, SharedMemoryBackend, ShmCacheConfig};

pub fn flush(config: ShmCacheConfig) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    let count = cache.identifiers()?.len();
    cache.flush()?;
    println!("flushed {count} entries");
    Ok(Outcome::Success)
}

pub fn list(config: ShmCacheConfig) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    for identifier in cache.identifiers()? {
        println!("{identifier}");
    }
    Ok(Outcome::Success)
}

pub fn gc(config: ShmCacheConfig) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    cache.collect_garbage();
    Ok(Outcome::Success)
}

pub fn locks(config: ShmCacheConfig, json: bool) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    let state = cache.lock_state()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        let keys = cache.identity().lock_keys();
        println!("Lock state for {}:", cache.identity());
        println!("  mutex set:  {}", keys.mutex);
        println!("  gate set:   {}", keys.gate);
        println!("  guard:      {}", state.guard);
        println!("  gate:       {}", state.gate);
        println!("  writers:    {}", state.writers);
        println!("  readers:    {}", state.readers);
        println!("  gate pid:   {}", state.gate_pid);
        println!("  idle:       {}", state.is_idle());
    }
    Ok(Outcome::Success)
}

pub fn reset_locks(config: ShmCacheConfig) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    let before = cache.lock_state()?;
    cache.reset_locks()?;
    println!("reset lock state (was: {before})");
    Ok(Outcome::Success)
}

pub fn destroy(config: ShmCacheConfig) -> eyre::Result<Outcome> {
    let cache = SharedMemoryBackend::bind(config)?;
    let identity = cache.identity().to_string();
    cache.destroy()?;
    println!("destroyed {identity}");
    Ok(Outcome::Success)
}
