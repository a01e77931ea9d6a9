//
// Copyright 2022 The slsa-builder Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transparency-log client.
//!
//! Three operations, all against the log's v1 API: search the index by
//! artifact digest, fetch an entry (with inclusion proof) by UUID, and
//! upload a proposed `intoto` entry.

pub mod models;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::errors::{BuilderError, Result};
use models::{IntotoEntry, LogEntry};

/// Default public transparency-log instance.
pub const REKOR_ROOT: &str = "https://rekor.sigstore.dev/";

#[derive(Serialize)]
struct SearchIndexQuery<'a> {
    hash: &'a str,
}

pub struct RekorClient {
    root_url: Url,
    client: reqwest::Client,
}

impl RekorClient {
    pub fn new(client: reqwest::Client) -> Result<Self> {
        Self::with_url(REKOR_ROOT, client)
    }

    pub fn with_url(root_url: &str, client: reqwest::Client) -> Result<Self> {
        Ok(RekorClient {
            root_url: Url::parse(root_url)?,
            client,
        })
    }

    /// Returns the UUIDs of every entry matching the given content hash
    /// (`sha256:<hex>`). An empty result is not an error here; the caller
    /// decides what absence means.
    pub async fn search_index(&self, hash: &str) -> Result<Vec<String>> {
        debug!(%hash, "searching transparency log index");
        let uuids: Vec<String> = self
            .client
            .post(self.root_url.join("api/v1/index/retrieve")?)
            .json(&SearchIndexQuery { hash })
            .send()
            .await
            .map_err(|e| BuilderError::RekorSearch(e.to_string()))?
            .error_for_status()
            .map_err(|e| BuilderError::RekorSearch(e.to_string()))?
            .json()
            .await
            .map_err(|e| BuilderError::RekorSearch(e.to_string()))?;
        Ok(uuids)
    }

    /// Fetches an entry and its inclusion proof by UUID.
    pub async fn get_log_entry_by_uuid(&self, uuid: &str) -> Result<LogEntry> {
        let response: HashMap<String, LogEntry> = self
            .client
            .get(self.root_url.join(&format!("api/v1/log/entries/{uuid}"))?)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BuilderError::Rekor(format!("fetching entry {uuid}: {e}")))?
            .json()
            .await?;

        // The response maps the requested UUID to its entry.
        let (uuid, mut entry) = response
            .into_iter()
            .next()
            .ok_or_else(|| BuilderError::Rekor("entry UUID cannot be extracted".to_string()))?;
        entry.uuid = uuid;
        Ok(entry)
    }

    /// Uploads a signed attestation as an `intoto` entry, returning the
    /// integrated entry.
    pub async fn create_intoto_entry(
        &self,
        envelope_json: String,
        cert_pem: &str,
    ) -> Result<LogEntry> {
        let proposed = IntotoEntry::proposed(envelope_json, cert_pem);

        debug!("uploading attestation to transparency log");
        let response: HashMap<String, LogEntry> = self
            .client
            .post(self.root_url.join("api/v1/log/entries")?)
            .json(&proposed)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BuilderError::Rekor(format!("creating entry: {e}")))?
            .json()
            .await?;

        let (uuid, mut entry) = response
            .into_iter()
            .next()
            .ok_or_else(|| BuilderError::Rekor("create response contains no entry".to_string()))?;
        entry.uuid = uuid;
        Ok(entry)
    }
}
