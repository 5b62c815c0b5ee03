// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pushing the local archive to S3-compatible object storage.

mod content_type;
mod sign;
mod store;
mod tree;

pub use content_type::{DEFAULT_CONTENT_TYPE, content_type_for};
pub use sign::{Signer, signing_key};
pub use store::{DEFAULT_BUCKET, DEFAULT_REGION, ObjectStore, S3Store, StorageConfig};
pub use tree::{SyncOptions, SyncStats, UploadDecision, remote_key, sync_tree};
