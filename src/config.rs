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

//! Versioned build manifest.
//!
//! The manifest is the only input the calling workflow controls on the build
//! path, so everything in it is treated as untrusted and re-validated by the
//! build driver before it reaches the compiler invocation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{BuilderError, Result};

/// The only schema version this builder understands.
const SUPPORTED_VERSION: i64 = 1;

/// Raw manifest as it appears on disk. `env` entries are `K=V` strings,
/// split and validated during conversion into [`BuildConfig`].
#[derive(Debug, Deserialize)]
struct ConfigFile {
    version: Option<i64>,
    #[serde(default)]
    goos: String,
    #[serde(default)]
    goarch: String,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    ldflags: Vec<String>,
    #[serde(default)]
    binary: String,
}

/// Validated build configuration.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub goos: String,
    pub goarch: String,
    pub env: BTreeMap<String, String>,
    pub flags: Vec<String>,
    pub ldflags: Vec<String>,
    pub binary: String,
}

impl BuildConfig {
    /// Load and validate a manifest from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        Self::from_slice(&content)
    }

    /// Load and validate a manifest from YAML bytes.
    pub fn from_slice(content: &[u8]) -> Result<Self> {
        let cf: ConfigFile = serde_yaml::from_slice(content)?;
        Self::from_config_file(cf)
    }

    fn from_config_file(cf: ConfigFile) -> Result<Self> {
        match cf.version {
            Some(SUPPORTED_VERSION) => {}
            other => return Err(BuilderError::UnsupportedVersion(other.unwrap_or(0))),
        }

        let mut env = BTreeMap::new();
        for entry in &cf.env {
            let parts: Vec<&str> = entry.split('=').collect();
            if parts.len() != 2 {
                return Err(BuilderError::InvalidEnvironmentVariable(entry.clone()));
            }
            env.insert(parts[0].to_string(), parts[1].to_string());
        }

        Ok(BuildConfig {
            goos: cf.goos,
            goarch: cf.goarch,
            env,
            flags: cf.flags,
            ldflags: cf.ldflags,
            binary: cf.binary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_manifest() {
        let yaml = br#"
version: 1
goos: linux
goarch: amd64
env:
  - GOFOO=bar
  - CGO_ENABLED=0
flags:
  - -trimpath
  - -race
ldflags:
  - "-X main.Version={{ .Env.VERSION }}"
binary: "app-{{ .OS }}-{{ .Arch }}"
"#;
        let cfg = BuildConfig::from_slice(yaml).unwrap();
        assert_eq!(cfg.goos, "linux");
        assert_eq!(cfg.goarch, "amd64");
        assert_eq!(cfg.env.get("GOFOO").map(String::as_str), Some("bar"));
        assert_eq!(cfg.env.get("CGO_ENABLED").map(String::as_str), Some("0"));
        assert_eq!(cfg.flags, vec!["-trimpath", "-race"]);
        assert_eq!(cfg.binary, "app-{{ .OS }}-{{ .Arch }}");
    }

    #[test]
    fn missing_version() {
        let err = BuildConfig::from_slice(b"goos: linux\n").unwrap_err();
        assert!(matches!(err, BuilderError::UnsupportedVersion(0)));
    }

    #[test]
    fn unsupported_version() {
        let err = BuildConfig::from_slice(b"version: 2\n").unwrap_err();
        assert!(matches!(err, BuilderError::UnsupportedVersion(2)));
    }

    #[test]
    fn env_entry_without_value() {
        let yaml = b"version: 1\nenv:\n  - GOFOO\n";
        let err = BuildConfig::from_slice(yaml).unwrap_err();
        assert!(matches!(err, BuilderError::InvalidEnvironmentVariable(e) if e == "GOFOO"));
    }

    #[test]
    fn env_entry_with_two_separators() {
        let yaml = b"version: 1\nenv:\n  - GOFOO=a=b\n";
        let err = BuildConfig::from_slice(yaml).unwrap_err();
        assert!(matches!(err, BuilderError::InvalidEnvironmentVariable(_)));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let yaml = b"version: 1\nfuture_field: true\n";
        assert!(BuildConfig::from_slice(yaml).is_ok());
    }

    #[test]
    fn absent_fields_default_to_empty() {
        let cfg = BuildConfig::from_slice(b"version: 1\n").unwrap();
        assert!(cfg.goos.is_empty());
        assert!(cfg.goarch.is_empty());
        assert!(cfg.env.is_empty());
        assert!(cfg.flags.is_empty());
        assert!(cfg.ldflags.is_empty());
        assert!(cfg.binary.is_empty());
    }
}
