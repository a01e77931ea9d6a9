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

//! Root-of-trust capability.
//!
//! Verification needs two out-of-band materials: the CA roots that issue
//! keyless signing certificates, and the transparency log's public key.
//! Distribution of those materials (TUF, vendored bundles, ...) is outside
//! this crate; callers hand them in through [`TrustRoot`].

use webpki::types::CertificateDer;

use crate::errors::{BuilderError, Result};

/// Environment variable pointing at a PEM file with the CA root (and any
/// intermediate) certificates.
pub const ROOT_FILE_ENV: &str = "SIGSTORE_ROOT_FILE";

/// Environment variable pointing at a PEM file with the transparency log's
/// public key.
pub const REKOR_PUBLIC_KEY_ENV: &str = "SIGSTORE_REKOR_PUBLIC_KEY";

/// A `TrustRoot` owns all key material necessary for establishing a root
/// of trust.
pub trait TrustRoot {
    /// DER-encoded CA certificates, roots first.
    fn fulcio_certs(&self) -> Result<Vec<CertificateDer<'static>>>;

    /// DER-encoded SubjectPublicKeyInfo of each acceptable log key.
    fn rekor_keys(&self) -> Result<Vec<Vec<u8>>>;
}

/// A [`TrustRoot`] with out-of-band trust materials. Users must initialize
/// its materials themselves, typically from files referenced by
/// [`ROOT_FILE_ENV`] and [`REKOR_PUBLIC_KEY_ENV`].
#[derive(Debug, Default)]
pub struct ManualTrustRoot {
    pub fulcio_certs: Vec<CertificateDer<'static>>,
    pub rekor_keys: Vec<Vec<u8>>,
}

impl ManualTrustRoot {
    /// Loads trust materials from the files named by the two environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        let root_file = std::env::var(ROOT_FILE_ENV).map_err(|_| {
            BuilderError::Unexpected(format!("{ROOT_FILE_ENV} not set: no CA roots available"))
        })?;
        let key_file = std::env::var(REKOR_PUBLIC_KEY_ENV).map_err(|_| {
            BuilderError::Unexpected(format!(
                "{REKOR_PUBLIC_KEY_ENV} not set: no transparency log key available"
            ))
        })?;

        Ok(ManualTrustRoot {
            fulcio_certs: parse_pem_certs(&std::fs::read(root_file)?)?,
            rekor_keys: parse_pem_keys(&std::fs::read(key_file)?)?,
        })
    }
}

impl TrustRoot for ManualTrustRoot {
    fn fulcio_certs(&self) -> Result<Vec<CertificateDer<'static>>> {
        Ok(self.fulcio_certs.clone())
    }

    fn rekor_keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.rekor_keys.clone())
    }
}

fn parse_pem_certs(pem_bytes: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let blocks = pem::parse_many(pem_bytes)?;
    if blocks.is_empty() {
        return Err(BuilderError::Unexpected(
            "no CERTIFICATE blocks in trust root file".to_string(),
        ));
    }
    Ok(blocks
        .into_iter()
        .filter(|b| b.tag() == "CERTIFICATE")
        .map(|b| CertificateDer::from(b.into_contents()))
        .collect())
}

fn parse_pem_keys(pem_bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let blocks = pem::parse_many(pem_bytes)?;
    if blocks.is_empty() {
        return Err(BuilderError::Unexpected(
            "no PUBLIC KEY blocks in log key file".to_string(),
        ));
    }
    Ok(blocks.into_iter().map(|b| b.into_contents()).collect())
}
