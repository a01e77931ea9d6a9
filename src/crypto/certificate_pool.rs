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

use webpki::types::{CertificateDer, TrustAnchor, UnixTime};
use webpki::{EndEntityCert, KeyUsage};

use crate::errors::{BuilderError, Result};

/// DER value of id-kp-codeSigning (1.3.6.1.5.5.7.3.3), the extended key
/// usage keyless signing certificates carry.
static EKU_CODE_SIGNING: &[u8] = &[0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x03];

static SUPPORTED_SIG_ALGS: &[&dyn webpki::types::SignatureVerificationAlgorithm] = &[
    webpki::ring::ECDSA_P256_SHA256,
    webpki::ring::ECDSA_P256_SHA384,
    webpki::ring::ECDSA_P384_SHA256,
    webpki::ring::ECDSA_P384_SHA384,
    webpki::ring::RSA_PKCS1_2048_8192_SHA256,
];

/// A collection of trusted root certificates.
///
/// Keyless signing certificates are valid only for a few minutes, so
/// chain validation happens at an explicit point in time (the log's
/// integrated time) rather than "now".
pub struct CertificatePool {
    trusted_roots: Vec<TrustAnchor<'static>>,
    intermediates: Vec<CertificateDer<'static>>,
}

impl CertificatePool {
    /// Builds a pool from DER-encoded root and intermediate certificates.
    pub fn from_certificates(
        trusted: impl IntoIterator<Item = CertificateDer<'static>>,
        intermediates: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self> {
        let trusted_roots = trusted
            .into_iter()
            .map(|der| {
                webpki::anchor_from_trusted_cert(&der)
                    .map(|anchor| anchor.to_owned())
                    .map_err(|e| {
                        BuilderError::CertificateVerification(format!("invalid trust root: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CertificatePool {
            trusted_roots,
            intermediates: intermediates.into_iter().collect(),
        })
    }

    /// Ensures the given end-entity certificate chains back to one of the
    /// trusted roots, is valid at `time`, and is a code-signing
    /// certificate.
    pub fn verify_cert_with_time(&self, cert_der: &CertificateDer, time: UnixTime) -> Result<()> {
        let cert = EndEntityCert::try_from(cert_der).map_err(|e| {
            BuilderError::CertificateVerification(format!("malformed certificate: {e}"))
        })?;

        cert.verify_for_usage(
            SUPPORTED_SIG_ALGS,
            &self.trusted_roots,
            &self.intermediates,
            time,
            KeyUsage::required(EKU_CODE_SIGNING),
            None,
            None,
        )
        .map_err(|e| BuilderError::CertificateVerification(e.to_string()))?;
        Ok(())
    }
}
