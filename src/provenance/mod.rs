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

//! Provenance assembly and verification.
//!
//! The generate path turns a verified binary name and digest plus the
//! ambient workflow context into a signed, log-anchored attestation. The
//! verify path reverses the whole chain: transparency-log lookup, Merkle
//! inclusion, signed-entry timestamp, certificate chain, envelope
//! signature, and finally the workflow-policy check on the calling
//! workflow named in the certificate.

pub mod statement;

use std::time::Duration;

use const_oid::ObjectIdentifier;
use p256::ecdsa::SigningKey;
use serde::Serialize;
use tracing::{debug, info};
use webpki::types::{CertificateDer, UnixTime};
use x509_cert::der::{DecodePem, Encode};
use x509_cert::ext::pkix::{name::GeneralName, SubjectAltName};
use x509_cert::Certificate;

use crate::build::sanitize::valid_output_name;
use crate::crypto::certificate_pool::CertificatePool;
use crate::crypto::merkle;
use crate::crypto::set::{to_canonical_json, verify_signed_entry_timestamp, SetPayload};
use crate::crypto::EcdsaVerificationKey;
use crate::dsse::{Envelope, PAYLOAD_TYPE_IN_TOTO};
use crate::errors::{BuilderError, Result};
use crate::fulcio::FulcioClient;
use crate::github::{GitHubContext, SourceRepository};
use crate::oidc;
use crate::rekor::models::LogEntry;
use crate::rekor::RekorClient;
use crate::trust::TrustRoot;
use crate::workflow::Workflow;
use statement::ProvenanceStatement;

/// OIDC issuer the signing certificate must have been issued for.
pub const CERT_OIDC_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Certificate extension carrying the OIDC issuer.
const OIDC_ISSUER_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");

/// Certificate extension carrying the workflow commit SHA.
const GITHUB_WORKFLOW_SHA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.3");

/// The workflow identity authenticated by the signing certificate: which
/// workflow file, in which repository, at which commit, produced the
/// attestation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowIdentity {
    /// `owner/repo`.
    pub repository: String,
    /// Path of the workflow file inside the repository.
    pub workflow_path: String,
    /// Git ref the workflow ran on.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Commit SHA the workflow file was taken from.
    pub commit_sha: String,
}

/// Validates the artifact name the same way the build driver derives it.
fn verify_provenance_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BuilderError::EmptyFilename);
    }
    if let Some(found) = name.chars().find(|&c| {
        !(c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }) {
        return Err(BuilderError::InvalidFilename {
            found,
            name: name.to_string(),
        });
    }
    debug_assert!(valid_output_name(name));
    Ok(())
}

/// Exactly 64 lowercase hex characters.
fn verify_digest(digest: &str) -> Result<()> {
    if digest.len() != 64
        || !digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(BuilderError::InvalidDigest(digest.to_string()));
    }
    Ok(())
}

/// Generates a signed, log-anchored SLSA provenance attestation for one
/// artifact and returns the serialized DSSE envelope.
pub async fn generate(
    name: &str,
    digest: &str,
    ctx: &GitHubContext,
    http: &reqwest::Client,
    fulcio: &FulcioClient,
    rekor: &RekorClient,
) -> Result<Vec<u8>> {
    verify_provenance_name(name)?;
    verify_digest(digest)?;

    let statement = ProvenanceStatement::new(name, digest, ctx);
    let payload = to_canonical_json(&statement)?;

    // Keyless signing: ambient identity, ephemeral key, short-lived
    // certificate.
    let token = oidc::detect_ambient_token(http).await?;
    let key = SigningKey::random(&mut rand::thread_rng());
    let certs = fulcio.request_cert(&key, &token).await?;

    let envelope = Envelope::sign(&payload, PAYLOAD_TYPE_IN_TOTO, &key)?;
    let envelope_bytes = serde_json::to_vec(&envelope)?;

    let entry = rekor
        .create_intoto_entry(
            String::from_utf8(envelope_bytes.clone())
                .map_err(|_| BuilderError::Unexpected("envelope is not UTF-8".to_string()))?,
            &certs.cert_pem,
        )
        .await?;
    info!(
        uuid = %entry.uuid,
        log_index = entry.log_index,
        "attestation integrated into transparency log"
    );

    Ok(envelope_bytes)
}

/// Verifies a signed provenance envelope against the artifact digest and
/// returns the authenticated workflow identity.
///
/// The calling workflow referenced by the signing certificate is fetched
/// at the certified commit and submitted to the workflow-policy validator;
/// an attestation signed from a non-conforming workflow does not verify.
pub async fn verify(
    envelope_bytes: &[u8],
    artifact_digest: &str,
    rekor: &RekorClient,
    trust: &impl TrustRoot,
    source: &impl SourceRepository,
) -> Result<WorkflowIdentity> {
    let envelope = Envelope::from_slice(envelope_bytes)?;

    // The subject digest inside the statement must match the artifact we
    // were asked about.
    let subject_digest = subject_sha256(&envelope)?;
    if subject_digest != artifact_digest {
        return Err(BuilderError::MismatchHash {
            got: artifact_digest.to_string(),
            subject: subject_digest,
        });
    }

    // Find candidate log entries by artifact digest.
    let uuids = rekor
        .search_index(&format!("sha256:{artifact_digest}"))
        .await?;
    if uuids.is_empty() {
        return Err(BuilderError::RekorSearch(
            "no matching entries found".to_string(),
        ));
    }

    let cert_pool = CertificatePool::from_certificates(trust.fulcio_certs()?, [])?;
    let log_keys = trust
        .rekor_keys()?
        .iter()
        .map(|der| EcdsaVerificationKey::from_spki_der(der))
        .collect::<Result<Vec<_>>>()?;

    // Iterate through each matching UUID; the first one whose entire chain
    // checks out wins.
    let mut certificate = None;
    for uuid in &uuids {
        match verify_candidate(uuid, &envelope, rekor, &cert_pool, &log_keys).await {
            Ok(cert) => {
                certificate = Some(cert);
                break;
            }
            Err(e) => debug!(%uuid, error = %e, "candidate entry rejected"),
        }
    }
    let certificate = certificate.ok_or(BuilderError::NoMatchingEntry)?;

    // The certificate authenticates which workflow ran; the policy
    // validator proves that workflow delegates to the trusted builder.
    let identity = workflow_identity(&certificate)?;
    info!(repository = %identity.repository, workflow = %identity.workflow_path,
          "verifying calling workflow");
    let content = source
        .fetch_file(
            &identity.repository,
            &identity.workflow_path,
            &identity.commit_sha,
        )
        .await?;
    Workflow::from_slice(&content)?.validate()?;

    Ok(identity)
}

/// Extracts the SHA-256 subject digest from the envelope payload.
fn subject_sha256(envelope: &Envelope) -> Result<String> {
    let payload = envelope.decoded_payload()?;
    let statement: ProvenanceStatement = serde_json::from_slice(&payload)
        .map_err(|_| BuilderError::InvalidDssePayload("unmarshalling json".to_string()))?;
    if statement.subject.is_empty() {
        return Err(BuilderError::InvalidDssePayload("no subjects".to_string()));
    }
    statement
        .subject_sha256()
        .map(str::to_string)
        .ok_or_else(|| BuilderError::InvalidDssePayload("no sha256 subject digest".to_string()))
}

/// Runs the full verification chain for one candidate log entry:
///
/// 1. fetch the entry and require an inclusion proof;
/// 2. verify Merkle inclusion of the entry in the log tree;
/// 3. verify the signed entry timestamp against the log key;
/// 4. extract the signing certificate from the entry body;
/// 5. validate the certificate chain at the integrated time and require
///    the expected OIDC issuer;
/// 6. verify the envelope signature with the certificate key;
/// 7. require the certificate validity window to contain the integrated
///    time.
async fn verify_candidate(
    uuid: &str,
    envelope: &Envelope,
    rekor: &RekorClient,
    cert_pool: &CertificatePool,
    log_keys: &[EcdsaVerificationKey],
) -> Result<Certificate> {
    let entry = rekor.get_log_entry_by_uuid(uuid).await?;
    verify_tlog_entry(&entry, log_keys)?;

    let body = entry.decode_body()?;
    let cert_pem = body.public_key_pem()?;
    let certificate = Certificate::from_pem(&cert_pem)
        .map_err(|e| BuilderError::CertificateVerification(format!("decoding certificate: {e}")))?;

    let integrated_time = u64::try_from(entry.integrated_time)
        .map_err(|_| BuilderError::Rekor("negative integrated time".to_string()))?;

    let cert_der = CertificateDer::from(certificate.to_der()?);
    cert_pool.verify_cert_with_time(
        &cert_der,
        UnixTime::since_unix_epoch(Duration::from_secs(integrated_time)),
    )?;

    let issuer = extension_value(&certificate, &OIDC_ISSUER_OID)
        .ok_or_else(|| BuilderError::CertificateInvalidIssuer("<no issuer extension>".to_string()))?;
    if issuer != CERT_OIDC_ISSUER {
        return Err(BuilderError::CertificateInvalidIssuer(issuer));
    }

    envelope.verify(&EcdsaVerificationKey::from_certificate(&certificate)?)?;

    let validity = &certificate.tbs_certificate.validity;
    let not_before = validity.not_before.to_unix_duration().as_secs();
    let not_after = validity.not_after.to_unix_duration().as_secs();
    if !(not_before <= integrated_time && integrated_time <= not_after) {
        return Err(BuilderError::CertificateExpired {
            integrated_time,
            not_before,
            not_after,
        });
    }

    Ok(certificate)
}

/// Inclusion proof plus signed-entry-timestamp verification.
fn verify_tlog_entry(entry: &LogEntry, log_keys: &[EcdsaVerificationKey]) -> Result<()> {
    let verification = entry
        .verification
        .as_ref()
        .ok_or_else(|| BuilderError::Rekor("entry has no verification material".to_string()))?;
    let proof = verification
        .inclusion_proof
        .as_ref()
        .ok_or_else(|| BuilderError::Rekor("inclusion proof not provided".to_string()))?;

    let hashes = proof
        .hashes
        .iter()
        .map(|h| decode_hash(h))
        .collect::<Result<Vec<_>>>()?;
    let root_hash = decode_hash(&proof.root_hash)?;

    merkle::verify_inclusion(
        u64::try_from(proof.log_index)
            .map_err(|_| BuilderError::Rekor("negative log index".to_string()))?,
        &entry.leaf_hash()?,
        u64::try_from(proof.tree_size)
            .map_err(|_| BuilderError::Rekor("negative tree size".to_string()))?,
        &hashes,
        &root_hash,
    )?;

    let payload = SetPayload {
        body: &entry.body,
        integrated_time: entry.integrated_time,
        log_id: &entry.log_id,
        log_index: entry.log_index,
    };
    if !log_keys.iter().any(|key| {
        verify_signed_entry_timestamp(&payload, &verification.signed_entry_timestamp, key).is_ok()
    }) {
        return Err(BuilderError::SetVerification);
    }
    Ok(())
}

fn decode_hash(hex_hash: &str) -> Result<merkle::Hash> {
    let bytes = hex::decode(hex_hash)?;
    bytes
        .try_into()
        .map_err(|_| BuilderError::Rekor(format!("invalid hash length: {hex_hash}")))
}

/// Reads the raw string value of a certificate extension. Issuer and
/// workflow extensions are stored as plain UTF-8, not DER-wrapped.
fn extension_value(cert: &Certificate, oid: &ObjectIdentifier) -> Option<String> {
    cert.tbs_certificate
        .extensions
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find(|ext| &ext.extn_id == oid)
        .and_then(|ext| std::str::from_utf8(ext.extn_value.as_bytes()).ok())
        .map(str::to_string)
}

/// Extracts the workflow identity from the certificate: the SAN URI holds
/// `https://github.com/OWNER/REPO/PATH@REF`, and the workflow-SHA
/// extension holds the commit.
pub fn workflow_identity(cert: &Certificate) -> Result<WorkflowIdentity> {
    let uri = san_uri(cert)?;
    let parsed = url::Url::parse(&uri)?;

    // Path is `/OWNER/REPO/PATH@REF`.
    let path = parsed.path();
    let parts: Vec<&str> = path.trim_start_matches('/').splitn(3, '/').collect();
    let &[owner, repo, rest] = &parts[..] else {
        return Err(BuilderError::CertificateVerification(format!(
            "unexpected job workflow ref: {uri}"
        )));
    };
    let (workflow_path, git_ref) = match rest.split_once('@') {
        Some((p, r)) => (p.to_string(), r.to_string()),
        None => (rest.to_string(), String::new()),
    };

    let commit_sha = extension_value(cert, &GITHUB_WORKFLOW_SHA_OID).ok_or_else(|| {
        BuilderError::CertificateVerification("missing workflow SHA extension".to_string())
    })?;

    Ok(WorkflowIdentity {
        repository: format!("{owner}/{repo}"),
        workflow_path,
        git_ref,
        commit_sha,
    })
}

/// First URI subject-alternative name of the certificate.
fn san_uri(cert: &Certificate) -> Result<String> {
    let san: SubjectAltName = match cert.tbs_certificate.get() {
        Ok(Some((_, san))) => san,
        _ => {
            return Err(BuilderError::CertificateVerification(
                "certificate has no subject alternative name".to_string(),
            ))
        }
    };

    san.0
        .iter()
        .find_map(|name| match name {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.as_str().to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            BuilderError::CertificateVerification(
                "subject alternative name holds no URI".to_string(),
            )
        })
}
