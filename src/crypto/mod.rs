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

//! Structures required to perform the cryptographic operations of the
//! verification chain. Every key in the keyless flow (the ephemeral
//! signing key, the certificate key, the log key) is ECDSA P-256 with
//! SHA-256, so that is the only scheme modeled here.

pub mod certificate_pool;
pub mod merkle;
pub mod set;

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use x509_cert::der::Encode;
use x509_cert::Certificate;

use crate::errors::{BuilderError, Result};

/// An ECDSA P-256 verification key, with constructors for the places keys
/// come from in this system: a PEM-encoded SPKI (the transparency log's
/// public key) or an X.509 certificate (the keyless signing certificate).
#[derive(Debug, Clone)]
pub struct EcdsaVerificationKey {
    inner: VerifyingKey,
}

impl EcdsaVerificationKey {
    /// Parses a `PUBLIC KEY` PEM block into a verification key.
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self> {
        let block = pem::parse(pem_bytes)?;
        Self::from_spki_der(block.contents())
    }

    /// Parses a DER-encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let inner = VerifyingKey::from_public_key_der(der)
            .map_err(|e| BuilderError::Unexpected(format!("invalid public key: {e}")))?;
        Ok(EcdsaVerificationKey { inner })
    }

    /// Extracts the subject public key from a certificate.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
        Self::from_spki_der(&spki)
    }

    /// Verifies an ASN.1 DER-encoded ECDSA signature over `message`.
    pub fn verify(&self, message: &[u8], signature_der: &[u8]) -> Result<()> {
        let signature = Signature::from_der(signature_der)
            .map_err(|_| BuilderError::SignatureVerification)?;
        self.inner
            .verify(message, &signature)
            .map_err(|_| BuilderError::SignatureVerification)
    }
}

impl From<&VerifyingKey> for EcdsaVerificationKey {
    fn from(inner: &VerifyingKey) -> Self {
        EcdsaVerificationKey { inner: *inner }
    }
}
