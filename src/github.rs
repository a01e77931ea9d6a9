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

//! CI host integration: the ambient workflow context, the step-output
//! channel, and the source-repository contents API used by the verifier to
//! fetch the calling workflow at an exact commit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{BuilderError, Result};

/// Environment variable carrying the workflow context JSON.
pub const GITHUB_CONTEXT_ENV: &str = "GITHUB_CONTEXT";

/// The slice of the workflow context the provenance consumes. The `token`
/// field is deserialized only so it can be dropped on the floor before the
/// context goes anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubContext {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub action_path: String,
    #[serde(default)]
    pub workflow: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub run_number: String,
}

impl GitHubContext {
    /// Parses the context from JSON and strips the credential it carries.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut ctx: GitHubContext = serde_json::from_str(content)?;
        ctx.token = String::new();
        Ok(ctx)
    }

    /// Reads the context from [`GITHUB_CONTEXT_ENV`].
    pub fn from_env() -> Result<Self> {
        let content = std::env::var(GITHUB_CONTEXT_ENV).map_err(|_| {
            BuilderError::Unexpected(format!("environment variable {GITHUB_CONTEXT_ENV} not present"))
        })?;
        Self::from_json(&content)
    }
}

/// Emits a value on the CI step-output channel.
pub fn set_output(name: &str, value: &str) {
    println!("::set-output name={name}::{value}");
}

/// Capability for fetching a file from a source repository at an exact
/// commit. The verifier uses it to retrieve the calling workflow named in
/// the signing certificate.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Returns the raw content of `path` in `owner/repo` at commit `sha`.
    async fn fetch_file(&self, repository: &str, path: &str, sha: &str) -> Result<Vec<u8>>;
}

/// GitHub contents-API implementation of [`SourceRepository`].
pub struct GitHubContentsClient {
    api_root: Url,
    client: reqwest::Client,
}

/// Default public API root.
pub const GITHUB_API_ROOT: &str = "https://api.github.com/";

impl GitHubContentsClient {
    pub fn new(client: reqwest::Client) -> Result<Self> {
        Self::with_url(GITHUB_API_ROOT, client)
    }

    pub fn with_url(api_root: &str, client: reqwest::Client) -> Result<Self> {
        Ok(GitHubContentsClient {
            api_root: Url::parse(api_root)?,
            client,
        })
    }
}

#[async_trait]
impl SourceRepository for GitHubContentsClient {
    async fn fetch_file(&self, repository: &str, path: &str, sha: &str) -> Result<Vec<u8>> {
        let url = self
            .api_root
            .join(&format!("repos/{repository}/contents/{path}"))?;

        let response = self
            .client
            .get(url)
            .query(&[("ref", sha)])
            .header("accept", "application/vnd.github.raw")
            .header("user-agent", concat!("slsa-builder/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BuilderError::GitHubApi(format!("fetching {repository}/{path}@{sha}: {e}")))?;

        Ok(response.bytes().await?.to_vec())
    }
}
