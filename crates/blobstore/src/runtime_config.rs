//! Selecting a storage backend from a TOML runtime config.
//!
//! ```toml
//! [blob_store]
//! type = "azure_blob"
//! account_name = "acct"
//! account_key = "..."
//! ```

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Context as _;
use blobi_config::StorageConfig;

use crate::StorageBackend;

/// The store type used when the `[blob_store]` table has no `type` key.
pub const DEFAULT_STORE_TYPE: &str = "azure_blob";

/// Defines the construction of a storage backend from a [`StorageConfig`].
pub trait MakeBlobStore: 'static + Send + Sync {
    /// Unique type identifier for the store.
    const RUNTIME_CONFIG_TYPE: &'static str;
    /// The backend this store type produces.
    type Backend: StorageBackend;

    /// Creates a new backend for the given configuration.
    fn make_store(&self, config: &StorageConfig) -> anyhow::Result<Self::Backend>;
}

type BackendFromConfig =
    Arc<dyn Fn(&StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> + Send + Sync>;

fn backend_from_config_fn<T: MakeBlobStore>(store_type: T) -> BackendFromConfig {
    Arc::new(move |config| {
        let backend = store_type
            .make_store(config)
            .context("could not make blob store from runtime config")?;
        Ok(Arc::new(backend))
    })
}

/// Maps store type names (the `type` key of `[blob_store]`) to backend constructors.
#[derive(Default, Clone)]
pub struct StoreTypeResolver {
    store_types: HashMap<&'static str, BackendFromConfig>,
}

impl StoreTypeResolver {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Registers a store type with the resolver.
    pub fn register_store_type<T: MakeBlobStore>(&mut self, store_type: T) -> anyhow::Result<()> {
        if self
            .store_types
            .insert(T::RUNTIME_CONFIG_TYPE, backend_from_config_fn(store_type))
            .is_some()
        {
            anyhow::bail!("duplicate blob store type {:?}", T::RUNTIME_CONFIG_TYPE);
        }
        Ok(())
    }

    /// Builds the backend registered for `store_type`.
    pub fn resolve(
        &self,
        store_type: &str,
        config: &StorageConfig,
    ) -> anyhow::Result<Arc<dyn StorageBackend>> {
        let maker = self.store_types.get(store_type).with_context(|| {
            format!("the store type '{store_type}' was not registered with the config resolver")
        })?;
        maker(config)
    }

    /// Builds the backend described by a parsed runtime config.
    pub fn resolve_config(
        &self,
        config: &BlobStoreConfig,
    ) -> anyhow::Result<Arc<dyn StorageBackend>> {
        self.resolve(&config.type_, &config.storage)
    }
}

/// The `[blob_store]` table of a runtime config file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobStoreConfig {
    pub type_: String,
    pub storage: StorageConfig,
}

impl BlobStoreConfig {
    /// Reads the `[blob_store]` table. A missing table yields the default
    /// store type with empty credentials, which environment overrides may fill in.
    pub fn from_toml_table(table: &toml::Table) -> anyhow::Result<Self> {
        let Some(value) = table.get("blob_store") else {
            return Ok(Self {
                type_: DEFAULT_STORE_TYPE.to_owned(),
                storage: StorageConfig::default(),
            });
        };
        let mut store = value
            .as_table()
            .context("`blob_store` must be a table")?
            .clone();
        let type_ = match store.remove("type") {
            Some(toml::Value::String(s)) => s,
            Some(other) => anyhow::bail!("blob store `type` must be a string, got {other}"),
            None => DEFAULT_STORE_TYPE.to_owned(),
        };
        let storage: StorageConfig = toml::Value::Table(store)
            .try_into()
            .context("could not parse blob store runtime config")?;
        Ok(Self { type_, storage })
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml.parse().context("invalid runtime config TOML")?;
        Self::from_toml_table(&table)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("invalid runtime config {}", path.display()))
    }

    /// Applies the `BLOBI_*` environment variables on top of the file values.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        self.storage = self.storage.with_env_overrides()?;
        Ok(self)
    }
}
