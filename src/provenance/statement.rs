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

//! SLSA provenance v0.2 statement model (in-toto Statement v0.1 header).
//!
//! See: <https://slsa.dev/provenance/v0.2> and
//! <https://github.com/in-toto/attestation/blob/main/spec/v0.1.0/statement.md>

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::github::GitHubContext;

pub const STATEMENT_TYPE: &str = "https://in-toto.io/Statement/v0.1";
pub const PREDICATE_SLSA_PROVENANCE: &str = "https://slsa.dev/provenance/v0.2";

/// Constant identity of the build system: GitHub-hosted Actions running
/// the trusted re-usable workflow.
pub const BUILD_TYPE: &str = "https://github.com/Attestations/GitHubActionsWorkflow@v1";
pub const BUILDER_ID: &str = "https://github.com/Attestations/GitHubHostedActions@v1";

/// A set of digests keyed by algorithm name.
pub type DigestSet = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceStatement {
    #[serde(rename = "_type")]
    pub statement_type: String,
    #[serde(rename = "predicateType")]
    pub predicate_type: String,
    pub subject: Vec<Subject>,
    pub predicate: ProvenancePredicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub digest: DigestSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenancePredicate {
    pub builder: ProvenanceBuilder,
    pub build_type: String,
    pub invocation: ProvenanceInvocation,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub materials: Vec<ProvenanceMaterial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceBuilder {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceInvocation {
    pub config_source: ConfigSource,
    pub environment: InvocationEnvironment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSource {
    pub uri: String,
    pub digest: DigestSet,
    pub entry_point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEnvironment {
    pub arch: String,
    pub env: WorkflowRunEnv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunEnv {
    #[serde(rename = "GITHUB_RUN_NUMBER")]
    pub github_run_number: String,
    #[serde(rename = "GITHUB_RUN_ID")]
    pub github_run_id: String,
    #[serde(rename = "GITHUB_EVENT_NAME")]
    pub github_event_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceMaterial {
    pub uri: String,
    pub digest: DigestSet,
}

impl ProvenanceStatement {
    /// Assembles the statement for one artifact built from the given
    /// workflow context.
    pub fn new(name: &str, digest_hex: &str, ctx: &GitHubContext) -> Self {
        let source_uri = format!("git+{}.git", ctx.repository);
        let source_digest: DigestSet = [("SHA1".to_string(), ctx.sha.clone())].into();

        ProvenanceStatement {
            statement_type: STATEMENT_TYPE.to_string(),
            predicate_type: PREDICATE_SLSA_PROVENANCE.to_string(),
            subject: vec![Subject {
                name: name.to_string(),
                digest: [("sha256".to_string(), digest_hex.to_string())].into(),
            }],
            predicate: ProvenancePredicate {
                builder: ProvenanceBuilder {
                    id: BUILDER_ID.to_string(),
                },
                build_type: BUILD_TYPE.to_string(),
                invocation: ProvenanceInvocation {
                    config_source: ConfigSource {
                        uri: source_uri.clone(),
                        digest: source_digest.clone(),
                        entry_point: ctx.workflow.clone(),
                    },
                    environment: InvocationEnvironment {
                        arch: "amd64".to_string(),
                        env: WorkflowRunEnv {
                            github_run_number: ctx.run_number.clone(),
                            github_run_id: ctx.run_id.clone(),
                            github_event_name: ctx.event_name.clone(),
                        },
                    },
                },
                materials: vec![ProvenanceMaterial {
                    uri: source_uri,
                    digest: source_digest,
                }],
            },
        }
    }

    /// SHA-256 subject digest of the first subject, if present.
    pub fn subject_sha256(&self) -> Option<&str> {
        self.subject
            .first()
            .and_then(|s| s.digest.get("sha256"))
            .map(String::as_str)
    }
}
