use std::fmt;

use crate::ConfigError;

/// Protocol used when synthesizing a connection string from an account name and key.
pub const DEFAULT_ENDPOINTS_PROTOCOL: &str = "https";
/// Endpoint suffix of the public Azure cloud.
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Blob endpoint of the local storage emulator (Azurite).
const DEVELOPMENT_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const ACCOUNT_NAME: &str = "AccountName";
const ACCOUNT_KEY: &str = "AccountKey";
const SHARED_ACCESS_SIGNATURE: &str = "SharedAccessSignature";
const BLOB_ENDPOINT: &str = "BlobEndpoint";
const ENDPOINTS_PROTOCOL: &str = "DefaultEndpointsProtocol";
const ENDPOINT_SUFFIX: &str = "EndpointSuffix";
const USE_DEVELOPMENT_STORAGE: &str = "UseDevelopmentStorage";

/// Keys whose values are redacted from `Debug` output.
const SECRET_KEYS: &[&str] = &[ACCOUNT_KEY, SHARED_ACCESS_SIGNATURE];

/// A storage connection string of the form `Key=Value;Key=Value`.
///
/// The original text is kept as-is and is what gets handed to the storage
/// backend; the parsed pairs are only used to look values up.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl ConnectionString {
    /// Parses a connection string.
    ///
    /// Values may themselves contain `=` (SAS tokens and base64 keys do), so
    /// each segment is split at its first `=` only. Empty segments, such as
    /// the one produced by a trailing `;`, are ignored.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (index, segment) in raw.split(';').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((key, value)) = segment.split_once('=') else {
                return Err(ConfigError::InvalidConnectionString(format!(
                    "segment {index} is not of the form 'key=value'"
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidConnectionString(format!(
                    "segment {index} has an empty key"
                )));
            }
            if pairs.iter().any(|(existing, _)| existing == key) {
                return Err(ConfigError::InvalidConnectionString(format!(
                    "duplicate key '{key}'"
                )));
            }
            pairs.push((key.to_owned(), value.trim().to_owned()));
        }

        if pairs.is_empty() {
            return Err(ConfigError::InvalidConnectionString(
                "connection string is empty".to_owned(),
            ));
        }

        Ok(Self {
            raw: raw.to_owned(),
            pairs,
        })
    }

    /// Builds the shared-key connection string for the public Azure cloud:
    ///
    /// `DefaultEndpointsProtocol=https;AccountName={name};AccountKey={key};EndpointSuffix=core.windows.net`
    pub fn synthesize(account_name: &str, account_key: &str) -> Self {
        let raw = format!(
            "{ENDPOINTS_PROTOCOL}={DEFAULT_ENDPOINTS_PROTOCOL};{ACCOUNT_NAME}={account_name};{ACCOUNT_KEY}={account_key};{ENDPOINT_SUFFIX}={DEFAULT_ENDPOINT_SUFFIX}"
        );
        let pairs = vec![
            (
                ENDPOINTS_PROTOCOL.to_owned(),
                DEFAULT_ENDPOINTS_PROTOCOL.to_owned(),
            ),
            (ACCOUNT_NAME.to_owned(), account_name.to_owned()),
            (ACCOUNT_KEY.to_owned(), account_key.to_owned()),
            (ENDPOINT_SUFFIX.to_owned(), DEFAULT_ENDPOINT_SUFFIX.to_owned()),
        ];
        Self { raw, pairs }
    }

    /// The connection string exactly as it was configured or synthesized.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Looks up the value of `key`. Keys are matched case-sensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn account_name(&self) -> Option<&str> {
        self.get(ACCOUNT_NAME)
    }

    pub fn account_key(&self) -> Option<&str> {
        self.get(ACCOUNT_KEY)
    }

    pub fn shared_access_signature(&self) -> Option<&str> {
        self.get(SHARED_ACCESS_SIGNATURE)
    }

    pub fn blob_endpoint(&self) -> Option<&str> {
        self.get(BLOB_ENDPOINT)
    }

    pub fn endpoints_protocol(&self) -> &str {
        self.get(ENDPOINTS_PROTOCOL)
            .unwrap_or(DEFAULT_ENDPOINTS_PROTOCOL)
    }

    pub fn endpoint_suffix(&self) -> &str {
        self.get(ENDPOINT_SUFFIX).unwrap_or(DEFAULT_ENDPOINT_SUFFIX)
    }

    /// Whether this is the `UseDevelopmentStorage=true` shorthand for the local emulator.
    pub fn uses_development_storage(&self) -> bool {
        self.get(USE_DEVELOPMENT_STORAGE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// The base URL of the blob service this connection string points at.
    pub fn blob_service_url(&self) -> Result<url::Url, ConfigError> {
        let base = if let Some(endpoint) = self.blob_endpoint() {
            endpoint.to_owned()
        } else if self.uses_development_storage() {
            DEVELOPMENT_BLOB_ENDPOINT.to_owned()
        } else {
            let account = self.account_name().ok_or_else(|| {
                ConfigError::InvalidConnectionString(format!(
                    "neither {BLOB_ENDPOINT} nor {ACCOUNT_NAME} is set"
                ))
            })?;
            format!(
                "{}://{account}.blob.{}",
                self.endpoints_protocol(),
                self.endpoint_suffix()
            )
        };
        url::Url::parse(&base).map_err(|e| {
            ConfigError::InvalidConnectionString(format!("invalid blob endpoint: {e}"))
        })
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.pairs {
            if SECRET_KEYS.contains(&key.as_str()) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesize_matches_template() {
        let cs = ConnectionString::synthesize("acct", "key123");
        assert_eq!(
            cs.as_str(),
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=key123;EndpointSuffix=core.windows.net"
        );
        assert_eq!(cs.account_name(), Some("acct"));
        assert_eq!(cs.account_key(), Some("key123"));
    }

    #[test]
    fn synthesized_string_parses_to_the_same_value() {
        let cs = ConnectionString::synthesize("acct", "a2V5==");
        assert_eq!(ConnectionString::parse(cs.as_str()).unwrap(), cs);
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let cs = ConnectionString::parse(
            "BlobEndpoint=https://acct.blob.core.windows.net/;SharedAccessSignature=sv=2022-11-02&sig=abc%3D",
        )
        .unwrap();
        assert_eq!(
            cs.shared_access_signature(),
            Some("sv=2022-11-02&sig=abc%3D")
        );
        assert_eq!(cs.account_name(), None);
    }

    #[test]
    fn trailing_separator_is_ignored() {
        let cs = ConnectionString::parse("AccountName=acct;AccountKey=k;").unwrap();
        assert_eq!(cs.account_name(), Some("acct"));
        assert_eq!(cs.as_str(), "AccountName=acct;AccountKey=k;");
    }

    #[test]
    fn parse_errors() {
        assert!(ConnectionString::parse("").is_err());
        assert!(ConnectionString::parse(";;").is_err());
        assert!(ConnectionString::parse("AccountName").is_err());
        assert!(ConnectionString::parse("=value").is_err());
        assert!(ConnectionString::parse("AccountName=a;AccountName=b").is_err());
    }

    #[test]
    fn blob_service_url_variants() {
        let cs = ConnectionString::synthesize("acct", "k");
        assert_eq!(
            cs.blob_service_url().unwrap().as_str(),
            "https://acct.blob.core.windows.net/"
        );

        let cs = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        assert_eq!(
            cs.blob_service_url().unwrap().as_str(),
            "http://127.0.0.1:10000/devstoreaccount1"
        );

        let cs = ConnectionString::parse(
            "AccountName=devstoreaccount1;AccountKey=k;BlobEndpoint=http://localhost:10000/devstoreaccount1",
        )
        .unwrap();
        assert_eq!(
            cs.blob_service_url().unwrap().as_str(),
            "http://localhost:10000/devstoreaccount1"
        );

        let cs = ConnectionString::parse("DefaultEndpointsProtocol=https").unwrap();
        assert!(cs.blob_service_url().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let cs = ConnectionString::synthesize("acct", "supersecret");
        let debug = format!("{cs:?}");
        assert!(debug.contains("acct"));
        assert!(!debug.contains("supersecret"));
    }
}
