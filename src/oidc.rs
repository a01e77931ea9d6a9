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

//! Ambient OIDC credential detection.
//!
//! Keyless signing binds the signature to a workload identity instead of a
//! long-lived key. On a GitHub-hosted runner that identity comes from the
//! Actions OIDC token endpoint, advertised through two environment
//! variables. No other providers are supported: the trusted builder only
//! ever runs there.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{BuilderError, Result};

const REQUEST_TOKEN_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";
const REQUEST_URL_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";

/// Audience the signing service expects in the identity token.
const AUDIENCE: &str = "sigstore";

/// The **unverified** claim set of an identity token. Only used to drive
/// the certificate request; trust in these values comes from the signing
/// service validating the token, not from us.
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
}

/// An OIDC identity token obtained from the ambient environment.
pub struct IdentityToken {
    raw: String,
    claims: Claims,
}

impl IdentityToken {
    /// Returns the unverified claim set for the token.
    pub fn unverified_claims(&self) -> &Claims {
        &self.claims
    }

    /// The raw JWT, for presentation to the signing service.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<&str> for IdentityToken {
    type Error = BuilderError;

    fn try_from(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('.').collect();
        if parts.len() != 3 {
            return Err(BuilderError::Oidc("malformed JWT".to_string()));
        }

        let claims = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| BuilderError::Oidc("malformed JWT: undecodable claims".to_string()))?;
        let claims: Claims = serde_json::from_slice(&claims)
            .map_err(|_| BuilderError::Oidc("malformed JWT: claims JSON malformed".to_string()))?;
        if claims.aud != AUDIENCE {
            return Err(BuilderError::Oidc(format!(
                "unexpected token audience: {}",
                claims.aud
            )));
        }

        Ok(IdentityToken {
            raw: value.to_string(),
            claims,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    value: String,
}

/// Fetches an identity token from the GitHub Actions OIDC endpoint.
///
/// Fails with [`BuilderError::NoAuthProvider`] when the endpoint is not
/// advertised in the environment, i.e. the process is not running in a
/// workflow with `id-token: write`.
pub async fn detect_ambient_token(client: &reqwest::Client) -> Result<IdentityToken> {
    let (Ok(request_token), Ok(request_url)) = (
        std::env::var(REQUEST_TOKEN_ENV),
        std::env::var(REQUEST_URL_ENV),
    ) else {
        return Err(BuilderError::NoAuthProvider);
    };

    debug!("requesting identity token from ambient OIDC endpoint");
    let response: TokenResponse = client
        .get(&request_url)
        .query(&[("audience", AUDIENCE)])
        .bearer_auth(request_token)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| BuilderError::Oidc(format!("token endpoint: {e}")))?
        .json()
        .await?;

    IdentityToken::try_from(response.value.as_str())
}
