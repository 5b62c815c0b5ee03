// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an `HttpClient` implementation
#[derive(Error, Debug)]
pub enum HttpError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when fetching a listing or book page
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch page {url}: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("Invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors that can occur while turning source links into catalog entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed time fragment '{fragment}' in {url}")]
    InvalidTimeFragment { url: String, fragment: String },

    #[error("Cannot resolve link '{href}': {reason}")]
    InvalidLink { href: String, reason: String },

    #[error("Link '{href}' has no file name")]
    MissingFilename { href: String },

    #[error("Title '{title}' has no characters usable in an id")]
    EmptyId { title: String },
}

/// Errors that can occur while downloading a single file
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("Failed to move {from} into place: {source}")]
    RenameFailed {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when writing a catalog document
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write catalog {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read catalog {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Missing or unusable object storage configuration
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Missing object storage setting {0}")]
    Missing(&'static str),

    #[error("Invalid endpoint URL '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build storage HTTP client: {0}")]
    ClientBuildFailed(#[source] reqwest::Error),
}

/// Errors that can occur while probing or writing a remote object
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Request for {key} failed: {source}")]
    RequestFailed {
        key: String,
        #[source]
        source: HttpError,
    },

    #[error("Object storage returned {status} for {key}")]
    HttpStatus { key: String, status: u16 },

    #[error("Object storage gave no usable size for {key}")]
    MissingSize { key: String },

    #[error("Failed to read local file {path}: {source}")]
    LocalReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object URL for {key}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: url::ParseError,
    },
}

/// Top-level errors for the upload phase
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),
}
