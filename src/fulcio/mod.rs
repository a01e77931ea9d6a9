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

//! Keyless-signing certificate client.
//!
//! Exchanges an OIDC identity token plus an ephemeral public key for a
//! short-lived signing certificate. Proof of possession of the private key
//! is a signature over the token's `sub` claim.

use base64::engine::general_purpose::STANDARD as BASE64_STD_ENGINE;
use base64::Engine as _;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::EncodePublicKey;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::{BuilderError, Result};
use crate::oidc::IdentityToken;

/// Default public signing-service root.
pub const FULCIO_ROOT: &str = "https://fulcio.sigstore.dev/";

/// Path within the service to obtain a signing certificate.
const SIGNING_CERT_PATH: &str = "api/v2/signingCert";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    oidc_identity_token: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PublicKey {
    algorithm: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PublicKeyRequest {
    public_key: PublicKey,
    proof_of_possession: String,
}

/// Certificate signing request: a public key and a signed challenge in
/// exchange for a signed X.509 certificate.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SigningCertRequest {
    credentials: Credentials,
    public_key_request: PublicKeyRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigningCertResponse {
    signed_certificate_embedded_sct: Option<CertificateChain>,
    signed_certificate_detached_sct: Option<CertificateChain>,
}

#[derive(Deserialize)]
struct CertificateChain {
    chain: Certificates,
}

#[derive(Deserialize)]
struct Certificates {
    certificates: Vec<String>,
}

/// The certificate chain returned by the signing service. The leaf binds
/// the ephemeral public key to the OIDC identity.
#[derive(Debug, Clone)]
pub struct CertificateResponse {
    /// PEM-encoded leaf certificate.
    pub cert_pem: String,
    /// PEM-encoded intermediate and root certificates, leaf's issuer first.
    pub chain_pem: Vec<String>,
}

pub struct FulcioClient {
    root_url: Url,
    client: reqwest::Client,
}

impl FulcioClient {
    pub fn new(client: reqwest::Client) -> Result<Self> {
        Self::with_url(FULCIO_ROOT, client)
    }

    pub fn with_url(root_url: &str, client: reqwest::Client) -> Result<Self> {
        Ok(FulcioClient {
            root_url: Url::parse(root_url)?,
            client,
        })
    }

    /// Requests a signing certificate for the given ephemeral key, bound
    /// to the identity in `token`.
    pub async fn request_cert(
        &self,
        key: &SigningKey,
        token: &IdentityToken,
    ) -> Result<CertificateResponse> {
        let verifying_key = VerifyingKey::from(key);
        let spki = verifying_key
            .to_public_key_der()
            .map_err(|e| BuilderError::Fulcio(format!("encoding public key: {e}")))?;

        // Proof of possession: sign the token's subject with the key we
        // want certified.
        let proof: DerSignature = key.sign(token.unverified_claims().sub.as_bytes());

        let request = SigningCertRequest {
            credentials: Credentials {
                oidc_identity_token: token.raw().to_string(),
            },
            public_key_request: PublicKeyRequest {
                public_key: PublicKey {
                    algorithm: "ECDSA",
                    content: BASE64_STD_ENGINE.encode(spki.as_bytes()),
                },
                proof_of_possession: BASE64_STD_ENGINE.encode(proof.as_bytes()),
            },
        };

        debug!(url = %self.root_url, "requesting signing certificate");
        let response: SigningCertResponse = self
            .client
            .post(self.root_url.join(SIGNING_CERT_PATH)?)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| BuilderError::Fulcio(format!("signing certificate request: {e}")))?
            .json()
            .await?;

        let chain = response
            .signed_certificate_embedded_sct
            .or(response.signed_certificate_detached_sct)
            .ok_or_else(|| BuilderError::Fulcio("response contains no certificates".to_string()))?
            .chain
            .certificates;

        let mut certs = chain.into_iter();
        let cert_pem = certs
            .next()
            .ok_or_else(|| BuilderError::Fulcio("empty certificate chain".to_string()))?;

        Ok(CertificateResponse {
            cert_pem,
            chain_pem: certs.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let request = SigningCertRequest {
            credentials: Credentials {
                oidc_identity_token: "header.payload.sig".to_string(),
            },
            public_key_request: PublicKeyRequest {
                public_key: PublicKey {
                    algorithm: "ECDSA",
                    content: "BASE64".to_string(),
                },
                proof_of_possession: "SIG".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["credentials"]["oidcIdentityToken"], "header.payload.sig");
        assert_eq!(json["publicKeyRequest"]["publicKey"]["algorithm"], "ECDSA");
        assert_eq!(json["publicKeyRequest"]["proofOfPossession"], "SIG");
    }

    #[test]
    fn response_takes_embedded_chain_first() {
        let body = r#"{
            "signedCertificateEmbeddedSct": {
                "chain": { "certificates": ["LEAF", "INTERMEDIATE", "ROOT"] }
            }
        }"#;
        let response: SigningCertResponse = serde_json::from_str(body).unwrap();
        let chain = response.signed_certificate_embedded_sct.unwrap().chain;
        assert_eq!(chain.certificates[0], "LEAF");
    }
}
