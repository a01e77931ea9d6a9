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

//! Signed Entry Timestamp (SET) verification.
//!
//! When the transparency log integrates an entry it signs the canonical
//! JSON of `{body, integratedTime, logID, logIndex}` with its log key. A
//! valid SET is the log's promise that the entry is (or will be) included
//! at the recorded time.

use base64::engine::general_purpose::STANDARD as BASE64_STD_ENGINE;
use base64::Engine as _;
use serde::Serialize;

use super::EcdsaVerificationKey;
use crate::errors::{BuilderError, Result};

/// The exact payload covered by the log's SET signature. Canonical JSON
/// sorts the fields, which matches the order the log signs them in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPayload<'a> {
    pub body: &'a str,
    pub integrated_time: i64,
    #[serde(rename = "logID")]
    pub log_id: &'a str,
    pub log_index: i64,
}

/// Serializes `value` as canonical JSON (sorted keys, no insignificant
/// whitespace), the form every signature in this system covers.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, olpc_cjson::CanonicalFormatter::new());
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Verifies a base64-encoded SET over the given payload with the log's
/// public key.
pub fn verify_signed_entry_timestamp(
    payload: &SetPayload<'_>,
    signed_entry_timestamp: &str,
    log_key: &EcdsaVerificationKey,
) -> Result<()> {
    let message = to_canonical_json(payload)?;
    let signature = BASE64_STD_ENGINE.decode(signed_entry_timestamp)?;
    log_key
        .verify(&message, &signature)
        .map_err(|_| BuilderError::SetVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};

    fn payload() -> SetPayload<'static> {
        SetPayload {
            body: "eyJhcGlWZXJzaW9uIjoiMC4wLjEifQ==",
            integrated_time: 1_654_015_743,
            log_id: "c0d23d6ad406973f9559f3ba2d1ca01f84147d8ffc5b8445c224f98b9591801d",
            log_index: 2_494_041,
        }
    }

    #[test]
    fn canonical_json_sorts_and_compacts() {
        let json = to_canonical_json(&payload()).unwrap();
        let expected = concat!(
            r#"{"body":"eyJhcGlWZXJzaW9uIjoiMC4wLjEifQ==","integratedTime":1654015743,"#,
            r#""logID":"c0d23d6ad406973f9559f3ba2d1ca01f84147d8ffc5b8445c224f98b9591801d","#,
            r#""logIndex":2494041}"#
        );
        assert_eq!(String::from_utf8(json).unwrap(), expected);
    }

    #[test]
    fn set_round_trip() {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let payload = payload();
        let message = to_canonical_json(&payload).unwrap();
        let signature: DerSignature = signing_key.sign(&message);
        let set = BASE64_STD_ENGINE.encode(signature.as_bytes());

        let key = EcdsaVerificationKey::from(&VerifyingKey::from(&signing_key));
        verify_signed_entry_timestamp(&payload, &set, &key).unwrap();

        let tampered = SetPayload {
            log_index: payload.log_index + 1,
            ..payload
        };
        assert!(matches!(
            verify_signed_entry_timestamp(&tampered, &set, &key).unwrap_err(),
            BuilderError::SetVerification
        ));
    }
}
