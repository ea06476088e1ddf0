use anyhow::Context as _;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::ClientBuilder;
use blobi_blobstore::{
    ConnectionString, StorageAuth, DEFAULT_ENDPOINTS_PROTOCOL, DEFAULT_ENDPOINT_SUFFIX,
};

/// Port the storage emulator listens on for blob traffic.
const EMULATOR_BLOB_PORT: u16 = 10000;

/// Where the blob service lives and how to authenticate against it.
#[derive(Clone)]
pub struct Connection {
    pub location: CloudLocation,
    pub credentials: StorageCredentials,
}

impl Connection {
    /// Resolves the connection for the given credentials.
    ///
    /// Managed identity goes through the `azure_identity` credential chain
    /// (environment, workload identity, managed identity, Azure CLI). Connection
    /// strings authenticate with their `AccountKey`, falling back to a
    /// `SharedAccessSignature`.
    pub fn new(auth: &StorageAuth) -> anyhow::Result<Self> {
        match auth {
            StorageAuth::ManagedIdentity { account_name } => {
                let credential = azure_identity::create_credential()
                    .context("could not create managed identity credential")?;
                Ok(Self {
                    location: CloudLocation::Public {
                        account: account_name.clone(),
                    },
                    credentials: StorageCredentials::token_credential(credential),
                })
            }
            StorageAuth::ConnectionString(cs) => {
                if cs.uses_development_storage() && cs.blob_endpoint().is_none() {
                    return Ok(Self {
                        location: CloudLocation::Emulator {
                            address: "127.0.0.1".to_owned(),
                            port: EMULATOR_BLOB_PORT,
                        },
                        credentials: StorageCredentials::emulator(),
                    });
                }
                Ok(Self {
                    location: location(cs)?,
                    credentials: credentials(cs)?,
                })
            }
        }
    }

    pub fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::with_location(self.location.clone(), self.credentials.clone())
    }
}

fn credentials(cs: &ConnectionString) -> anyhow::Result<StorageCredentials> {
    match (cs.account_name(), cs.account_key(), cs.shared_access_signature()) {
        (Some(account), Some(key), _) => {
            Ok(StorageCredentials::access_key(account.to_owned(), key.to_owned()))
        }
        (_, _, Some(sas)) => StorageCredentials::sas_token(sas.trim_start_matches('?'))
            .context("invalid SharedAccessSignature in connection string"),
        _ => anyhow::bail!(
            "connection string has neither AccountName and AccountKey nor SharedAccessSignature"
        ),
    }
}

/// Where the blob service lives.
fn location(cs: &ConnectionString) -> anyhow::Result<CloudLocation> {
    let account = cs.account_name().unwrap_or_default().to_owned();
    if let Some(endpoint) = cs.blob_endpoint() {
        let url = url::Url::parse(endpoint).context("invalid BlobEndpoint in connection string")?;
        let host = url
            .host_str()
            .context("BlobEndpoint in connection string has no host")?;
        if is_local(host) {
            return Ok(CloudLocation::Emulator {
                address: host.to_owned(),
                port: url.port().unwrap_or(EMULATOR_BLOB_PORT),
            });
        }
        return Ok(CloudLocation::Custom {
            account,
            uri: endpoint.trim_end_matches('/').to_owned(),
        });
    }
    if account.is_empty() {
        anyhow::bail!("connection string has neither AccountName nor BlobEndpoint");
    }
    if cs.endpoint_suffix() == DEFAULT_ENDPOINT_SUFFIX
        && cs.endpoints_protocol() == DEFAULT_ENDPOINTS_PROTOCOL
    {
        return Ok(CloudLocation::Public { account });
    }
    let uri = cs.blob_service_url()?.as_str().trim_end_matches('/').to_owned();
    Ok(CloudLocation::Custom { account, uri })
}

fn is_local(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
}
