use crate::{ConfigError, ConnectionString};

/// How a storage backend should authenticate against the blob service.
///
/// This is the outcome of [`StorageConfig::resolve_auth`](crate::StorageConfig::resolve_auth);
/// backends never look at the raw configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageAuth {
    /// Use the ambient identity of the hosting platform for the named account.
    ManagedIdentity { account_name: String },
    /// Use the shared key or SAS carried by a connection string.
    ConnectionString(ConnectionString),
}

impl StorageAuth {
    /// The storage account name, if it can be determined.
    pub fn account_name(&self) -> Option<&str> {
        match self {
            StorageAuth::ManagedIdentity { account_name } => Some(account_name),
            StorageAuth::ConnectionString(cs) => cs.account_name(),
        }
    }

    /// The URL of the named container under these credentials.
    ///
    /// For managed identity this is always
    /// `https://{account_name}.blob.core.windows.net/{container}`.
    pub fn container_url(&self, container: &str) -> Result<url::Url, ConfigError> {
        let base = match self {
            StorageAuth::ManagedIdentity { account_name } => {
                let base = format!("https://{account_name}.blob.core.windows.net/");
                url::Url::parse(&base).map_err(|e| {
                    ConfigError::InvalidAccountName(format!("'{account_name}': {e}"))
                })?
            }
            StorageAuth::ConnectionString(cs) => cs.blob_service_url()?,
        };

        let mut url = base;
        url.path_segments_mut()
            .map_err(|()| {
                ConfigError::InvalidConnectionString("blob endpoint cannot be a base".to_owned())
            })?
            .pop_if_empty()
            .push(container);
        Ok(url)
    }
}
