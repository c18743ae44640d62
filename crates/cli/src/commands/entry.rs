//! Single-entry commands
use super::Outcome;
use eyre::WrapErr;
use shmcache::{validate_identifier, CacheBackend, SharedMemoryBackend, ShmCacheConfig};
use std::io::{Read, Write};
use std::path::PathBuf;

fn bind(config: ShmCacheConfig, identifier: &str) -> eyre::Result<SharedMemoryBackend> {
    validate_identifier(identifier)?;
    Ok(SharedMemoryBackend::bind(config)?)
}

pub fn set(
    config: ShmCacheConfig,
    identifier: &str,
    value: Option<String>,
    file: Option<PathBuf>,
) -> eyre::Result<Outcome> {
    let cache = bind(config, identifier)?;

    let data = match (value, file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?,
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .wrap_err("failed to read value from stdin")?;
            buf
        }
    };

    cache.set(identifier, &data, &[], None)?;
    tracing::info!(identifier, bytes = data.len(), "stored");
    Ok(Outcome::Success)
}

pub fn get(config: ShmCacheConfig, identifier: &str) -> eyre::Result<Outcome> {
    let cache = bind(config, identifier)?;
    match cache.get(identifier)? {
        Some(data) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(Outcome::Success)
        }
        None => {
            tracing::info!(identifier, "not found");
            Ok(Outcome::Miss)
        }
    }
}

pub fn has(config: ShmCacheConfig, identifier: &str) -> eyre::Result<Outcome> {
    let cache = bind(config, identifier)?;
    if cache.has(identifier)? {
        println!("present");
        Ok(Outcome::Success)
    } else {
        println!("absent");
        Ok(Outcome::Miss)
    }
}

pub fn remove(config: ShmCacheConfig, identifier: &str) -> eyre::Result<Outcome> {
    let cache = bind(config, identifier)?;
    if cache.remove(identifier)? {
        println!("removed {identifier}");
    } else {
        println!("{identifier} was not present");
    }
    Ok(Outcome::Success)
}
