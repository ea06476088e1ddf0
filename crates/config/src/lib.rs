//! Connection configuration for a blob storage account.
//!
//! A [`StorageConfig`] is built once at startup, either in code, from a TOML
//! table, or from environment variables, and is treated as immutable after
//! that. [`StorageConfig::resolve_auth`] turns it into a [`StorageAuth`] using
//! a fixed precedence:
//!
//! 1. `use_managed_identity` wins; keys and connection strings are ignored.
//! 2. Otherwise a non-empty `connection_string` is used verbatim.
//! 3. Otherwise a connection string is synthesized from `account_name` and `account_key`.

mod auth;
mod connection_string;

use std::{fmt, path::Path};

use anyhow::Context as _;
use serde::Deserialize;

pub use auth::StorageAuth;
pub use connection_string::{ConnectionString, DEFAULT_ENDPOINTS_PROTOCOL, DEFAULT_ENDPOINT_SUFFIX};

/// Environment variable overriding [`StorageConfig::account_name`].
pub const ACCOUNT_NAME_ENV: &str = "BLOBI_ACCOUNT_NAME";
/// Environment variable overriding [`StorageConfig::account_key`].
pub const ACCOUNT_KEY_ENV: &str = "BLOBI_ACCOUNT_KEY";
/// Environment variable overriding [`StorageConfig::connection_string`].
pub const CONNECTION_STRING_ENV: &str = "BLOBI_CONNECTION_STRING";
/// Environment variable overriding [`StorageConfig::use_managed_identity`].
pub const USE_MANAGED_IDENTITY_ENV: &str = "BLOBI_USE_MANAGED_IDENTITY";

/// Errors raised while resolving credentials from a [`StorageConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither managed identity, a connection string, nor an account name and key pair is configured.
    #[error("no storage credentials configured: enable use_managed_identity, set connection_string, or set both account_name and account_key")]
    MissingCredentials,
    /// Managed identity is enabled but there is no account to address.
    #[error("use_managed_identity requires account_name to be set")]
    MissingAccountName,
    /// The account name cannot be used to form a URL.
    #[error("invalid storage account name {0}")]
    InvalidAccountName(String),
    /// The connection string does not follow the `key=value;...` grammar.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
}

/// Connection options for one storage account.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// The storage account name.
    #[serde(alias = "accountName")]
    pub account_name: String,
    /// The shared key for the account.
    #[serde(alias = "accountKey")]
    pub account_key: String,
    /// A full connection string. Takes precedence over `account_name` and `account_key`.
    #[serde(alias = "connectionString")]
    pub connection_string: String,
    /// Authenticate with the platform's managed identity instead of a shared key.
    #[serde(alias = "useManagedIdentity")]
    pub use_managed_identity: bool,
}

impl StorageConfig {
    /// Configuration that authenticates with a connection string.
    pub fn from_connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Configuration that authenticates with an account name and shared key.
    pub fn from_account_key(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            ..Default::default()
        }
    }

    /// Configuration that authenticates with the platform's managed identity.
    pub fn managed_identity(account_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            use_managed_identity: true,
            ..Default::default()
        }
    }

    /// Parses a TOML table whose keys are the fields of this struct.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        toml::from_str(toml).context("could not parse storage configuration")
    }

    /// Reads and parses a TOML file whose keys are the fields of this struct.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Applies the `BLOBI_*` environment variables on top of this configuration.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by environment variable name. Unset and
    /// empty values leave the existing field alone.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(name) = get(ACCOUNT_NAME_ENV) {
            self.account_name = name;
        }
        if let Some(key) = get(ACCOUNT_KEY_ENV) {
            self.account_key = key;
        }
        if let Some(cs) = get(CONNECTION_STRING_ENV) {
            self.connection_string = cs;
        }
        if let Some(flag) = get(USE_MANAGED_IDENTITY_ENV) {
            self.use_managed_identity = parse_flag(&flag)
                .with_context(|| format!("invalid value for {USE_MANAGED_IDENTITY_ENV}"))?;
        }
        Ok(self)
    }

    /// Decides how to authenticate.
    pub fn resolve_auth(&self) -> Result<StorageAuth, ConfigError> {
        if self.use_managed_identity {
            if self.account_name.trim().is_empty() {
                return Err(ConfigError::MissingAccountName);
            }
            return Ok(StorageAuth::ManagedIdentity {
                account_name: self.account_name.clone(),
            });
        }

        if !self.connection_string.trim().is_empty() {
            let cs = ConnectionString::parse(&self.connection_string)?;
            return Ok(StorageAuth::ConnectionString(cs));
        }

        if !self.account_name.trim().is_empty() && !self.account_key.trim().is_empty() {
            let cs = ConnectionString::synthesize(&self.account_name, &self.account_key);
            return Ok(StorageAuth::ConnectionString(cs));
        }

        Err(ConfigError::MissingCredentials)
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("expected true or false, got {other:?}"),
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connection_string = if self.connection_string.is_empty() {
            None
        } else {
            Some(
                ConnectionString::parse(&self.connection_string)
                    .map(|cs| format!("{cs:?}"))
                    .unwrap_or_else(|_| "<unparseable>".to_owned()),
            )
        };
        f.debug_struct("StorageConfig")
            .field("account_name", &self.account_name)
            .field(
                "account_key",
                &if self.account_key.is_empty() { "" } else { "<redacted>" },
            )
            .field("connection_string", &connection_string)
            .field("use_managed_identity", &self.use_managed_identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn config(name: &str, key: &str, cs: &str, managed: bool) -> StorageConfig {
        StorageConfig {
            account_name: name.to_owned(),
            account_key: key.to_owned(),
            connection_string: cs.to_owned(),
            use_managed_identity: managed,
        }
    }

    #[test]
    fn synthesizes_connection_string_from_name_and_key() {
        let auth = config("acct", "key123", "", false).resolve_auth().unwrap();
        match auth {
            StorageAuth::ConnectionString(cs) => assert_eq!(
                cs.as_str(),
                "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=key123;EndpointSuffix=core.windows.net"
            ),
            other => panic!("wrong variant {other:?}"),
        }
    }

    #[test]
    fn connection_string_is_used_verbatim() {
        let raw = "DefaultEndpointsProtocol=https;AccountName=other;AccountKey=abc==;EndpointSuffix=core.windows.net";
        for (name, key) in [("", ""), ("acct", "key123"), ("acct", "")] {
            match config(name, key, raw, false).resolve_auth().unwrap() {
                StorageAuth::ConnectionString(cs) => assert_eq!(cs.as_str(), raw),
                other => panic!("wrong variant {other:?}"),
            }
        }
    }

    #[test]
    fn managed_identity_ignores_keys_and_connection_string() {
        let plain = config("acct", "", "", true).resolve_auth().unwrap();
        let noisy = config("acct", "key123", "AccountName=x;AccountKey=y", true)
            .resolve_auth()
            .unwrap();
        assert_eq!(plain, noisy);
        assert_eq!(
            noisy.container_url("docs").unwrap().as_str(),
            "https://acct.blob.core.windows.net/docs"
        );
    }

    #[test]
    fn missing_credentials_is_a_configuration_error() {
        assert!(matches!(
            config("", "", "", false).resolve_auth(),
            Err(ConfigError::MissingCredentials)
        ));
        assert!(matches!(
            config("acct", "", "", false).resolve_auth(),
            Err(ConfigError::MissingCredentials)
        ));
        assert!(matches!(
            config("", "key", "  ", false).resolve_auth(),
            Err(ConfigError::MissingCredentials)
        ));
        assert!(matches!(
            config("", "key", "", true).resolve_auth(),
            Err(ConfigError::MissingAccountName)
        ));
        assert!(matches!(
            config("", "", "garbage", false).resolve_auth(),
            Err(ConfigError::InvalidConnectionString(_))
        ));
    }

    #[test]
    fn parses_snake_and_camel_case_keys() {
        let snake = StorageConfig::from_toml_str(
            r#"
            account_name = "acct"
            account_key = "key123"
            use_managed_identity = false
            "#,
        )
        .unwrap();
        let camel = StorageConfig::from_toml_str(
            r#"
            accountName = "acct"
            accountKey = "key123"
            useManagedIdentity = false
            "#,
        )
        .unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake, StorageConfig::from_account_key("acct", "key123"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(StorageConfig::from_toml_str(r#"acount_name = "typo""#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(br#"connection_string = "UseDevelopmentStorage=true""#)
            .unwrap();
        let path = file.into_temp_path();
        let config = StorageConfig::from_toml_file(&path).unwrap();
        assert_eq!(
            config,
            StorageConfig::from_connection_string("UseDevelopmentStorage=true")
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = StorageConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.toml"));
    }

    #[test]
    fn overrides_replace_only_set_values() {
        let vars: HashMap<&str, &str> = [
            (ACCOUNT_KEY_ENV, "fromenv"),
            (CONNECTION_STRING_ENV, ""),
            (USE_MANAGED_IDENTITY_ENV, "YES"),
        ]
        .into();
        let config = StorageConfig::from_account_key("acct", "fromfile")
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.account_name, "acct");
        assert_eq!(config.account_key, "fromenv");
        assert_eq!(config.connection_string, "");
        assert!(config.use_managed_identity);
    }

    #[test]
    fn invalid_flag_override_is_an_error() {
        let result = StorageConfig::default().with_overrides_from(|k| {
            (k == USE_MANAGED_IDENTITY_ENV).then(|| "sometimes".to_owned())
        });
        assert!(result.is_err());
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let config = config(
            "acct",
            "topsecret",
            "AccountName=acct;AccountKey=alsosecret",
            false,
        );
        let debug = format!("{config:?}");
        assert!(debug.contains("acct"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("alsosecret"));
    }
}
