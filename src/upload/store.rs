// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::error::{CredentialError, HttpError, StorageError};
use crate::http::USER_AGENT;

use super::sign::{EMPTY_PAYLOAD_SHA256, Signer, UNSIGNED_PAYLOAD};

/// Default bucket the archive is mirrored into
pub const DEFAULT_BUCKET: &str = "rssb-stream";

/// Region used when none is configured; what R2 expects
pub const DEFAULT_REGION: &str = "auto";

/// Remote side of the sync engine
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object at `key`, or `None` if there is none
    async fn head(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Write the local file at `path` to `key`, returning the bytes sent
    async fn put_file(&self, key: &str, path: &Path, content_type: &str)
    -> Result<u64, StorageError>;
}

/// Connection settings for an S3-compatible store
#[derive(Clone, Default)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl StorageConfig {
    /// Whether endpoint, key id and secret are all set
    pub fn has_credentials(&self) -> bool {
        [&self.endpoint, &self.access_key_id, &self.secret_access_key]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

/// Object store speaking the S3 REST protocol with path-style addressing
#[derive(Debug, Clone)]
pub struct S3Store {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    signer: Signer,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Result<Self, CredentialError> {
        let endpoint = required(&config.endpoint, "R2_ENDPOINT_URL")?;
        let access_key_id = required(&config.access_key_id, "R2_ACCESS_KEY_ID")?;
        let secret_access_key = required(&config.secret_access_key, "R2_SECRET_ACCESS_KEY")?;
        let region = config.region.as_deref().unwrap_or(DEFAULT_REGION);

        let endpoint = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| {
            CredentialError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                source: e,
            }
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(CredentialError::ClientBuildFailed)?;

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            signer: Signer::new(access_key_id, secret_access_key, region),
        })
    }

    /// `{endpoint}/{bucket}/{key}` with every key segment percent-encoded
    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let base = self.endpoint.as_str().trim_end_matches('/');
        let bucket = urlencoding::encode(&self.bucket);
        Url::parse(&format!("{base}/{bucket}/{encoded_key}")).map_err(|e| {
            StorageError::InvalidKey {
                key: key.to_string(),
                source: e,
            }
        })
    }

    fn request_failed(key: &str, error: reqwest::Error) -> StorageError {
        StorageError::RequestFailed {
            key: key.to_string(),
            source: HttpError::from(error),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let url = self.object_url(key)?;
        let signed = self
            .signer
            .sign("HEAD", &url, &[], EMPTY_PAYLOAD_SHA256, Utc::now());

        let mut request = self.client.head(url);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::request_failed(key, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        object_size(key, response.headers()).map(Some)
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let local_failed = |e| StorageError::LocalReadFailed {
            path: path.to_path_buf(),
            source: e,
        };
        let file = tokio::fs::File::open(path).await.map_err(local_failed)?;
        let size = file.metadata().await.map_err(local_failed)?.len();

        let url = self.object_url(key)?;
        let signed = self.signer.sign(
            "PUT",
            &url,
            &[("content-type", content_type)],
            UNSIGNED_PAYLOAD,
            Utc::now(),
        );

        debug!(key, size, content_type, "uploading");
        let mut request = self
            .client
            .put(url)
            .header("content-type", content_type)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)));
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::request_failed(key, e))?;

        if !response.status().is_success() {
            return Err(StorageError::HttpStatus {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(size)
    }
}

/// Size of an object from its HEAD response headers
///
/// HEAD has no body, so the size comes from `Content-Length`. A missing or
/// unparsable header is an error rather than a guess.
fn object_size(key: &str, headers: &HeaderMap) -> Result<u64, StorageError> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| StorageError::MissingSize {
            key: key.to_string(),
        })
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, CredentialError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(CredentialError::Missing(name))
}
