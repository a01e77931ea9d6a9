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

//! DSSE (Dead Simple Signing Envelope) support.
//!
//! Implements the envelope model and the Pre-Authentication Encoding (PAE)
//! that DSSE signatures cover.
//!
//! See: <https://github.com/secure-systems-lab/dsse/blob/v1.0.0/envelope.md>

use base64::engine::general_purpose::STANDARD as BASE64_STD_ENGINE;
use base64::Engine as _;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey};
use serde::{Deserialize, Serialize};

use crate::crypto::EcdsaVerificationKey;
use crate::errors::{BuilderError, Result};

/// Payload type bound into every envelope this crate produces.
pub const PAYLOAD_TYPE_IN_TOTO: &str = "application/vnd.in-toto+json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded payload bytes.
    pub payload: String,
    #[serde(rename = "payloadType")]
    pub payload_type: String,
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub keyid: String,
    /// Base64-encoded ASN.1 DER ECDSA signature over the PAE.
    pub sig: String,
}

impl Envelope {
    /// Wraps and signs `payload` under the given payload type.
    pub fn sign(payload: &[u8], payload_type: &str, key: &SigningKey) -> Result<Self> {
        let mut envelope = Envelope {
            payload: BASE64_STD_ENGINE.encode(payload),
            payload_type: payload_type.to_string(),
            signatures: vec![],
        };
        let signature: DerSignature = key.sign(&pae(payload_type, payload));
        envelope.signatures.push(Signature {
            keyid: String::new(),
            sig: BASE64_STD_ENGINE.encode(signature.as_bytes()),
        });
        Ok(envelope)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| BuilderError::InvalidDssePayload(format!("decoding envelope: {e}")))
    }

    /// Decodes the payload bytes.
    pub fn decoded_payload(&self) -> Result<Vec<u8>> {
        BASE64_STD_ENGINE
            .decode(&self.payload)
            .map_err(|_| BuilderError::InvalidDssePayload("decoding payload".to_string()))
    }

    /// Verifies that at least one envelope signature is a valid signature
    /// over the PAE under the given key.
    pub fn verify(&self, key: &EcdsaVerificationKey) -> Result<()> {
        let message = pae(&self.payload_type, &self.decoded_payload()?);
        for signature in &self.signatures {
            let Ok(raw) = BASE64_STD_ENGINE.decode(&signature.sig) else {
                continue;
            };
            if key.verify(&message, &raw).is_ok() {
                return Ok(());
            }
        }
        Err(BuilderError::SignatureVerification)
    }
}

/// Computes the DSSE Pre-Authentication Encoding:
///
/// ```text
/// "DSSEv1" + SP + LEN(type) + SP + type + SP + LEN(body) + SP + body
/// ```
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut pae = format!("DSSEv1 {} {} ", payload_type.len(), payload_type).into_bytes();
    pae.extend_from_slice(format!("{} ", payload.len()).as_bytes());
    pae.extend_from_slice(payload);
    pae
}
