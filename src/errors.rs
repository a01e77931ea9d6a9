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

//! The errors that can be raised by slsa-builder.
//!
//! Every policy violation has its own variant so that callers (and tests)
//! can match on the exact failure instead of parsing message strings.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuilderError>;

/// Errors related to Merkle tree inclusion proofs (RFC 6962).
#[derive(Error, Debug)]
pub enum MerkleProofError {
    #[error("inclusion proof: leaf index {index} >= tree size {tree_size}")]
    IndexOutOfBounds { index: u64, tree_size: u64 },

    #[error("inclusion proof: wrong proof size (got {got}, want {want})")]
    WrongProofSize { got: usize, want: usize },

    #[error("inclusion proof: invalid hash size (got {got}, expected 32)")]
    InvalidHashSize { got: usize },

    #[error("inclusion proof: computed root {computed} does not match expected root {expected}")]
    RootMismatch { computed: String, expected: String },
}

#[derive(Error, Debug)]
pub enum BuilderError {
    // ---- configuration ----
    #[error("version not supported: {0}")]
    UnsupportedVersion(i64),

    #[error("invalid environment variable: {0}")]
    InvalidEnvironmentVariable(String),

    // ---- build driver ----
    #[error("argument not supported: {0}")]
    UnsupportedArgument(String),

    #[error("env variable empty or not set: {0}")]
    EnvVariableNameEmpty(String),

    #[error("env variable not allowed: {0}")]
    EnvVariableNameNotAllowed(String),

    #[error("invalid env argument: {0}")]
    InvalidEnvArgument(String),

    #[error("invalid filename: found character '{found}' in {name}")]
    InvalidFilename { found: char, name: String },

    #[error("empty filename")]
    EmptyFilename,

    // ---- workflow policy ----
    #[error("invalid GitHub workflow: {0}")]
    InvalidGitHubWorkflow(String),

    #[error("{0}: env variables are declared")]
    DeclaredEnv(String),

    #[error("{0}: defaults are declared")]
    DeclaredDefaults(String),

    #[error("{0}: steps are declared")]
    DeclaredStep(String),

    #[error("{job}: {label}: self-hosted runner not supported")]
    SelfHostedRunner { job: String, label: String },

    #[error("{job}: {uses} is not pinned: invalid re-usable workflow call")]
    InvalidReUsableWorkflow { job: String, uses: String },

    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    #[error("no permission declared")]
    PermissionsDefaultWrite,

    #[error("permissions are not set to `read-all`")]
    PermissionsNotReadAll,

    #[error("{0}: permission is set to write")]
    PermissionWrite(String),

    #[error("builder: permissions all set: {0}")]
    PermissionAllSet(String),

    #[error("builder: too many permission scopes defined: {0}")]
    PermissionScopeTooMany(usize),

    #[error("builder: {0}: permission not set")]
    PermissionNotSet(String),

    #[error("{first}: trusted builder used in multiple jobs: {second}")]
    MultipleJobsUseTrustedBuilder { first: String, second: String },

    #[error("no trusted job found")]
    NoTrustedJobFound,

    // ---- provenance ----
    #[error("invalid DSSE envelope payload: {0}")]
    InvalidDssePayload(String),

    #[error("error searching rekor entries: {0}")]
    RekorSearch(String),

    #[error("artifact hash does not match provenance subject: got {got}, subject is {subject}")]
    MismatchHash { got: String, subject: String },

    #[error("could not find a matching signature entry")]
    NoMatchingEntry,

    #[error("no ambient OIDC credentials detected")]
    NoAuthProvider,

    #[error("sha256 digest is not valid: {0}")]
    InvalidDigest(String),

    #[error("Fulcio error: {0}")]
    Fulcio(String),

    #[error("Rekor error: {0}")]
    Rekor(String),

    #[error("OIDC error: {0}")]
    Oidc(String),

    #[error("signed entry timestamp verification failed")]
    SetVerification,

    #[error("certificate verification failed: {0}")]
    CertificateVerification(String),

    #[error("certificate has not been issued for {0}")]
    CertificateInvalidIssuer(String),

    #[error(
        "certificate expired before signatures were entered in log: \
         integrated time {integrated_time} outside [{not_before}, {not_after}]"
    )]
    CertificateExpired {
        integrated_time: u64,
        not_before: u64,
        not_after: u64,
    },

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    // ---- plumbing ----
    #[error(transparent)]
    MerkleProof(#[from] MerkleProofError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("failed to parse YAML: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Base64Decode(#[from] base64::DecodeError),

    #[error(transparent)]
    HexDecode(#[from] hex::FromHexError),

    #[error(transparent)]
    Pem(#[from] pem::PemError),

    #[error("DER error: {0}")]
    Der(#[from] x509_cert::der::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
