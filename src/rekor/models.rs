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

//! Transparency-log wire models: the integrated log entry with its
//! inclusion proof, and the `intoto` v0.0.1 entry body this system uploads
//! and reads back.

use base64::engine::general_purpose::STANDARD as BASE64_STD_ENGINE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::{BuilderError, Result};

/// An entry as returned by the log, keyed by UUID in the response map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Filled in by the client from the response map key.
    #[serde(skip)]
    pub uuid: String,
    /// Base64-encoded entry body.
    pub body: String,
    pub integrated_time: i64,
    #[serde(rename = "logID")]
    pub log_id: String,
    pub log_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl LogEntry {
    /// Decodes the entry body into the intoto entry model.
    pub fn decode_body(&self) -> Result<IntotoEntry> {
        let decoded = BASE64_STD_ENGINE.decode(&self.body)?;
        serde_json::from_slice(&decoded).map_err(BuilderError::from)
    }

    /// The Merkle leaf hash of this entry, which for this log is the
    /// decoded entry UUID. Sharded logs prefix the UUID with an 8-byte
    /// tree ID; only the trailing 32 bytes are the leaf hash.
    pub fn leaf_hash(&self) -> Result<[u8; 32]> {
        let decoded = hex::decode(&self.uuid)?;
        let tail: [u8; 32] = decoded
            .get(decoded.len().saturating_sub(32)..)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| {
                BuilderError::Rekor(format!("entry UUID is too short: {}", self.uuid))
            })?;
        Ok(tail)
    }
}

/// The log's signature over the entry plus the proof that the entry is
/// included in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    pub signed_entry_timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    /// Audit path from leaf to root, hex-encoded.
    pub hashes: Vec<String>,
    pub log_index: i64,
    pub root_hash: String,
    pub tree_size: i64,
}

/// `intoto` v0.0.1 entry body. On upload `content.envelope` carries the
/// DSSE envelope; on read-back the log retains only the payload hash and
/// the verifier material (`public_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntotoEntry {
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub spec: IntotoSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntotoSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IntotoContent>,
    /// Base64-encoded PEM of the signing certificate.
    pub public_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntotoContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hash {
    pub algorithm: String,
    pub value: String,
}

impl IntotoEntry {
    /// A proposed entry wrapping a DSSE envelope and the PEM certificate
    /// that verifies it.
    pub fn proposed(envelope_json: String, cert_pem: &str) -> Self {
        IntotoEntry {
            kind: "intoto".to_string(),
            api_version: "0.0.1".to_string(),
            spec: IntotoSpec {
                content: Some(IntotoContent {
                    envelope: Some(envelope_json),
                    ..Default::default()
                }),
                public_key: BASE64_STD_ENGINE.encode(cert_pem.as_bytes()),
            },
        }
    }

    /// The PEM bytes of the signing certificate stored in this entry.
    pub fn public_key_pem(&self) -> Result<Vec<u8>> {
        BASE64_STD_ENGINE
            .decode(&self.spec.public_key)
            .map_err(BuilderError::from)
    }
}
