#![allow(dead_code)]

use std::sync::Arc;

use blobi::{Blobi, MemoryBackend, Metadata, StorageConfig};

/// A `Blobi` over a fresh in-memory backend, using shared-key credentials.
pub fn memory_blobi() -> (Blobi, MemoryBackend) {
    memory_blobi_with(StorageConfig::from_account_key("acct", "key123"))
}

pub fn memory_blobi_with(config: StorageConfig) -> (Blobi, MemoryBackend) {
    let backend = MemoryBackend::new();
    let blobi = Blobi::new(config, Arc::new(backend.clone()));
    (blobi, backend)
}

pub fn md(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
